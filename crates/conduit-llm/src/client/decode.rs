//! Native stream decoding
//!
//! Payloads that fail to parse are logged and skipped; transport errors
//! are surfaced as [`LlmError::Streaming`].

use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt, TryStreamExt, future};
use serde::de::DeserializeOwned;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

use super::ChunkStream;
use crate::error::LlmError;

/// Decode a `text/event-stream` body
///
/// The `[DONE]` sentinel and empty payloads produce no item.
pub fn decode_sse<S, E, C>(bytes: S) -> ChunkStream<C>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    C: DeserializeOwned + Send + 'static,
{
    let chunks = bytes.eventsource().filter_map(|result| {
        future::ready(match result {
            Ok(event) => parse(event.data.trim()),
            Err(e) => Some(Err(LlmError::Streaming(e.to_string()))),
        })
    });

    Box::pin(chunks)
}

/// Decode a newline-delimited JSON body
pub fn decode_ndjson<S, E, C>(bytes: S) -> ChunkStream<C>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    C: DeserializeOwned + Send + 'static,
{
    let reader = StreamReader::new(bytes.map_err(|e| std::io::Error::other(e.to_string())));
    let chunks = FramedRead::new(reader, LinesCodec::new()).filter_map(|result| {
        future::ready(match result {
            Ok(line) => parse(line.trim()),
            Err(e) => Some(Err(LlmError::Streaming(e.to_string()))),
        })
    });

    Box::pin(chunks)
}

fn parse<C: DeserializeOwned>(data: &str) -> Option<Result<C, LlmError>> {
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    match serde_json::from_str(data) {
        Ok(chunk) => Some(Ok(chunk)),
        Err(e) => {
            tracing::debug!(error = %e, data = %data, "skipping unparseable stream chunk");
            None
        }
    }
}

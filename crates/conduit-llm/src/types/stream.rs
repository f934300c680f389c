use std::time::{Duration, Instant};

use super::UsageView;

/// A tool call being assembled from stream fragments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccumulatedToolCall {
    /// Provider's index for this call within the response
    pub index: u32,
    pub id: String,
    pub name: String,
    /// Raw JSON text, grown by appending fragments in arrival order
    pub arguments: String,
}

/// Wall-clock markers for one stream
#[derive(Debug, Clone, Copy)]
pub struct StreamTiming {
    pub start_time: Instant,
    pub first_chunk_time: Option<Instant>,
}

impl StreamTiming {
    /// Time from adapter creation to the first upstream chunk
    pub fn time_to_first_chunk(&self) -> Option<Duration> {
        self.first_chunk_time
            .map(|first| first.saturating_duration_since(self.start_time))
    }
}

/// Running aggregate of one in-flight stream
///
/// `E` is the provider's native chunk type; tool-call chunks are kept
/// verbatim for replay. `text` and every tool call's `arguments` only
/// ever grow.
#[derive(Debug, Clone)]
pub struct StreamAccumulatorState<E> {
    pub response_id: String,
    pub model: String,
    pub text: String,
    pub tool_calls: Vec<AccumulatedToolCall>,
    pub raw_tool_call_events: Vec<E>,
    pub usage: Option<UsageView>,
    pub stop_reason: Option<String>,
    pub timing: StreamTiming,
    finished: bool,
}

impl<E> Default for StreamAccumulatorState<E> {
    fn default() -> Self {
        Self {
            response_id: String::new(),
            model: String::new(),
            text: String::new(),
            tool_calls: Vec::new(),
            raw_tool_call_events: Vec::new(),
            usage: None,
            stop_reason: None,
            timing: StreamTiming {
                start_time: Instant::now(),
                first_chunk_time: None,
            },
            finished: false,
        }
    }
}

impl<E> StreamAccumulatorState<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record arrival of a chunk; only the first call has an effect
    pub fn record_chunk(&mut self) {
        if self.timing.first_chunk_time.is_none() {
            self.timing.first_chunk_time = Some(Instant::now());
        }
    }

    /// Slot for the tool call at `index`, created on first sight
    pub fn tool_call_slot(&mut self, index: u32) -> &mut AccumulatedToolCall {
        let position = match self.tool_calls.iter().position(|call| call.index == index) {
            Some(position) => position,
            None => {
                self.tool_calls.push(AccumulatedToolCall {
                    index,
                    ..AccumulatedToolCall::default()
                });
                self.tool_calls.len() - 1
            }
        };
        &mut self.tool_calls[position]
    }

    /// Latch the stream as logically finished
    ///
    /// Returns `true` only for the call that performed the transition, so
    /// a terminal signal is reported once however many arrive.
    pub const fn finish(&mut self) -> bool {
        let first = !self.finished;
        self.finished = true;
        first
    }

    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// What one call to `process_chunk` produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkProcessingResult {
    /// Downstream SSE fragment to forward, if any
    pub sse_data: Option<String>,
    /// Chunk carried tool-call data
    pub is_tool_call_chunk: bool,
    /// Chunk moved the stream to its finished state
    pub is_final: bool,
}

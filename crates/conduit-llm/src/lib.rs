//! Provider adapter and streaming normalization engine for Conduit
//!
//! Exposes one OpenAI-compatible Chat Completions contract downstream and
//! translates requests, responses and streams to and from each upstream
//! provider's native protocol.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod adapter;
pub mod client;
pub mod compression;
pub mod convert;
pub mod error;
#[cfg(feature = "http")]
pub mod handler;
pub mod policy;
pub mod pricing;
pub mod protocol;
pub mod provider;
pub mod relay;
pub mod state;
pub mod types;

pub use adapter::{AdapterContext, MaterializedRequest, RequestAdapter, ResponseAdapter, StreamAdapter};
pub use error::LlmError;
#[cfg(feature = "http")]
pub use handler::llm_router;
pub use provider::{ProviderFactory, ProviderFamily, ProviderId, WireFamily};
pub use state::LlmState;

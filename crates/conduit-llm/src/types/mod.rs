//! Provider-neutral value types shared by every adapter

mod message;
mod stream;
mod usage;

pub use message::*;
pub use stream::*;
pub use usage::*;

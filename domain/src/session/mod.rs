//! Message exchange primitives.
//!
//! - [`message::Message`]: a role/content pair sent to a worker
//! - [`stream::StreamEvent`]: an incremental event of a streamed reply

pub mod message;
pub mod stream;

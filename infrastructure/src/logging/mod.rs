//! Logging infrastructure: structured job event logging.
//!
//! Provides [`JsonlJobEventLogger`], a JSONL file writer that implements
//! the [`JobEventLogger`](council_application::JobEventLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlJobEventLogger;

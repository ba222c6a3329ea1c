//! Presentation layer for llm-council
//!
//! This crate contains CLI definitions, output formatters, progress
//! reporters, and the stdin control reader used while a job runs.

pub mod cli;
pub mod control;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{Cli, OutputFormat};
pub use control::{ControlCommand, ControlParseError, apply_command, spawn_stdin_reader};
pub use output::console::ConsoleFormatter;
pub use output::debate::DebateFormatter;
pub use output::formatter::OutputFormatter;
pub use progress::follow::follow_job;
pub use progress::reporter::{ProgressReporter, ProgressView, SimpleProgress};

//! Job control from the terminal while a job runs

mod stdin;

pub use stdin::{ControlCommand, ControlParseError, apply_command, spawn_stdin_reader};

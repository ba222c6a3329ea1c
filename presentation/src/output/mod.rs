//! Output formatting for council jobs and debates

pub mod console;
pub mod debate;
pub mod formatter;

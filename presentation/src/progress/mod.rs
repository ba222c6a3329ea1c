//! Live progress display driven by the job watcher

pub mod follow;
pub mod reporter;

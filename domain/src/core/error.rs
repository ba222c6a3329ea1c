//! Domain error types

use crate::job::status::JobStatus;
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("No workers configured for the council")]
    NoWorkers,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid worker id: {0}")]
    InvalidWorker(String),

    #[error("Unknown debate role: {0}")]
    UnknownRole(String),

    #[error("Unknown output format: {0} (expected full, synthesis or json)")]
    InvalidOutputFormat(String),

    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    #[error("Job already finished with status {0}")]
    AlreadyFinished(JobStatus),
}

impl DomainError {
    /// Check if this error was caused by touching a finished job
    pub fn is_terminal(&self) -> bool {
        matches!(self, DomainError::AlreadyFinished(_))
    }
}

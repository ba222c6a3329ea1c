//! Error types for the OpenRouter adapter

use council_application::{FailureReason, WorkerFailure};
use council_domain::WorkerId;
use thiserror::Error;

/// Result type alias for OpenRouter operations
pub type Result<T> = std::result::Result<T, OpenRouterError>;

#[derive(Error, Debug)]
pub enum OpenRouterError {
    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl OpenRouterError {
    pub fn reason(&self) -> FailureReason {
        match self {
            OpenRouterError::Status { .. }
            | OpenRouterError::MissingApiKey(_)
            | OpenRouterError::InvalidUrl(_) => FailureReason::Rejected,
            OpenRouterError::Serialization(_) | OpenRouterError::UnexpectedResponse(_) => {
                FailureReason::MalformedResponse
            }
            OpenRouterError::Transport(e) | OpenRouterError::Client(e) if e.is_decode() => {
                FailureReason::MalformedResponse
            }
            OpenRouterError::Transport(_) | OpenRouterError::Client(_) => {
                FailureReason::Unreachable
            }
        }
    }

    pub fn into_failure(self, worker: &WorkerId) -> WorkerFailure {
        WorkerFailure::new(worker.clone(), self.reason(), self.to_string())
    }
}

/// Keep error bodies readable in logs
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

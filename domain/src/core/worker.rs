//! Worker identifier value object

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Identifier of a remote model endpoint (Value Object)
///
/// Opaque to the orchestrator; usually a provider model slug such as
/// `openai/gpt-4o` or `anthropic/claude-sonnet-4.5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Create a worker id, rejecting blank names
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidWorker(id));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-friendly short name
    ///
    /// E.g., "openai/gpt-4o-mini" -> "Gpt"
    pub fn display_name(&self) -> String {
        let tail = self.0.rsplit('/').next().unwrap_or(&self.0);
        let head = tail.split('-').next().unwrap_or(tail);
        let mut chars = head.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.map(|c| c.to_ascii_lowercase())).collect(),
            None => self.0.clone(),
        }
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WorkerId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkerId::new(s)
    }
}

impl AsRef<str> for WorkerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_id_trims() {
        let id = WorkerId::new("  openai/gpt-4o ").unwrap();
        assert_eq!(id.as_str(), "openai/gpt-4o");
    }

    #[test]
    fn test_blank_worker_rejected() {
        assert!(WorkerId::new("   ").is_err());
        assert!("".parse::<WorkerId>().is_err());
    }

    #[test]
    fn test_display_name() {
        let id: WorkerId = "openai/gpt-4o-mini".parse().unwrap();
        assert_eq!(id.display_name(), "Gpt");
        let id: WorkerId = "google/gemini-2.5-flash".parse().unwrap();
        assert_eq!(id.display_name(), "Gemini");
    }

    #[test]
    fn test_serde_transparent() {
        let id: WorkerId = "x-ai/grok-4".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"x-ai/grok-4\"");
        let back: WorkerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

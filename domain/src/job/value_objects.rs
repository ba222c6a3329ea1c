//! Frozen stage outputs and derived metadata.
//!
//! - [`Stage1Result`] - one worker's independent answer
//! - [`Stage2Result`] - one worker's evaluation of the anonymized answers
//! - [`Stage3Result`] - the chairman's synthesis
//! - [`AggregateRank`] - mean rank position of a worker across all raters
//! - [`JobMetadata`] - label map and aggregate produced by stage 2

use crate::core::worker::WorkerId;
use crate::ranking::labels::LabelMap;
use serde::{Deserialize, Serialize};

/// Text returned when the chairman could not produce a synthesis
pub const SYNTHESIS_FALLBACK: &str = "Error: Unable to generate final synthesis.";

/// Reason recorded when stage 2 is skipped
pub const INSUFFICIENT_RESPONSES: &str = "insufficient_responses_for_ranking";

/// A worker's stage-1 answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage1Result {
    pub model: WorkerId,
    pub response: String,
}

impl Stage1Result {
    pub fn new(model: WorkerId, response: impl Into<String>) -> Self {
        Self {
            model,
            response: response.into(),
        }
    }
}

/// A worker's stage-2 evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage2Result {
    pub model: WorkerId,
    /// Raw evaluation text
    pub ranking: String,
    /// Labels in the order the rater ranked them (best first)
    pub parsed_ranking: Vec<String>,
}

/// The chairman's stage-3 answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage3Result {
    pub model: WorkerId,
    pub response: String,
}

impl Stage3Result {
    pub fn new(model: WorkerId, response: impl Into<String>) -> Self {
        Self {
            model,
            response: response.into(),
        }
    }

    /// Placeholder used when the chairman fails
    pub fn fallback(model: WorkerId) -> Self {
        Self::new(model, SYNTHESIS_FALLBACK)
    }

    pub fn is_fallback(&self) -> bool {
        self.response == SYNTHESIS_FALLBACK
    }
}

/// Mean rank position of one worker (lower is better)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRank {
    pub model: WorkerId,
    /// Mean of 1-indexed positions, rounded to two decimals
    pub average_rank: f64,
    /// Number of raters that mentioned this worker's label
    pub rankings_count: usize,
}

/// Derived stage-2 metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub label_to_model: LabelMap,
    pub aggregate_rankings: Vec<AggregateRank>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
}

impl JobMetadata {
    /// Metadata for a job whose stage 2 was skipped
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skipped_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_synthesis() {
        let result = Stage3Result::fallback("chair".parse().unwrap());
        assert!(result.is_fallback());
        assert_eq!(result.response, SYNTHESIS_FALLBACK);
    }

    #[test]
    fn test_skipped_metadata_serialization() {
        let meta = JobMetadata::skipped(INSUFFICIENT_RESPONSES);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["skipped_reason"], INSUFFICIENT_RESPONSES);
        assert!(json["aggregate_rankings"].as_array().unwrap().is_empty());

        let full = serde_json::to_value(JobMetadata::default()).unwrap();
        assert!(full.get("skipped_reason").is_none());
    }
}

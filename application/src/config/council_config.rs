//! Council membership.
//!
//! [`CouncilConfig`] names the workers that answer and rank (stage 1 and 2),
//! the chairman that synthesizes (stage 3), and the worker used for
//! conversation titles.

use council_domain::{DomainError, WorkerId};

/// Largest council whose answers can be labelled "Response A".."Response Z"
pub const MAX_COUNCIL_SIZE: usize = council_domain::ranking::labels::MAX_LABELS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouncilConfig {
    pub models: Vec<WorkerId>,
    pub chairman: WorkerId,
    pub title_model: WorkerId,
}

impl CouncilConfig {
    /// Build a council, rejecting an empty or oversized worker list.
    ///
    /// Duplicate workers are dropped, keeping the first occurrence.
    pub fn new(
        models: Vec<WorkerId>,
        chairman: WorkerId,
        title_model: WorkerId,
    ) -> Result<Self, DomainError> {
        let mut unique: Vec<WorkerId> = Vec::with_capacity(models.len());
        for model in models {
            if !unique.contains(&model) {
                unique.push(model);
            }
        }
        if unique.is_empty() {
            return Err(DomainError::NoWorkers);
        }
        if unique.len() > MAX_COUNCIL_SIZE {
            return Err(DomainError::InvalidWorker(format!(
                "council has {} workers, at most {} can be ranked",
                unique.len(),
                MAX_COUNCIL_SIZE
            )));
        }
        Ok(Self {
            models: unique,
            chairman,
            title_model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(s: &str) -> WorkerId {
        s.parse().unwrap()
    }

    #[test]
    fn test_rejects_empty_council() {
        let err = CouncilConfig::new(vec![], w("chair"), w("title")).unwrap_err();
        assert_eq!(err, DomainError::NoWorkers);
    }

    #[test]
    fn test_dedups_workers() {
        let config = CouncilConfig::new(vec![w("a"), w("b"), w("a")], w("chair"), w("title")).unwrap();
        assert_eq!(config.models, vec![w("a"), w("b")]);
    }

    #[test]
    fn test_rejects_more_than_26() {
        let models = (0..27).map(|i| w(&format!("m{}", i))).collect();
        assert!(CouncilConfig::new(models, w("chair"), w("title")).is_err());
    }
}

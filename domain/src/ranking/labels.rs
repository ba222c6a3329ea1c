//! Anonymization labels for stage-2 evaluation

use crate::core::worker::WorkerId;
use crate::job::value_objects::Stage1Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest council that can be labelled with single letters.
pub const MAX_LABELS: usize = 26;

/// Label for the answer at `index` ("Response A" for 0).
///
/// Returns `None` past "Response Z".
pub fn label_for(index: usize) -> Option<String> {
    if index >= MAX_LABELS {
        return None;
    }
    let letter = (b'A' + index as u8) as char;
    Some(format!("Response {}", letter))
}

/// Mapping from anonymous label to the worker that wrote the answer.
///
/// Built fresh from each job's stage-1 results, in the order the results
/// were returned; never shared between jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap(BTreeMap<String, WorkerId>);

impl LabelMap {
    /// Assign labels to `results` in order. Results past the 26th are
    /// left unlabelled.
    pub fn assign(results: &[Stage1Result]) -> Self {
        let map = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| label_for(i).map(|label| (label, r.model.clone())))
            .collect();
        Self(map)
    }

    pub fn worker_for(&self, label: &str) -> Option<&WorkerId> {
        self.0.get(label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &WorkerId)> {
        self.0.iter()
    }

    /// Pair each labelled answer with its text, in label order
    pub fn labelled<'a>(&self, results: &'a [Stage1Result]) -> Vec<(String, &'a str)> {
        results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| label_for(i).map(|label| (label, r.response.as_str())))
            .collect()
    }
}

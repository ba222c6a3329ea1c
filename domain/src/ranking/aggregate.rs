//! Aggregate ranking across raters

use crate::core::worker::WorkerId;
use crate::job::value_objects::{AggregateRank, Stage2Result};
use crate::ranking::labels::LabelMap;

/// Mean 1-indexed rank position of every worker mentioned by at least one
/// rater, best (lowest) first.
///
/// Workers nobody mentioned are absent. Ties keep the order in which the
/// workers were first mentioned.
pub fn calculate_aggregate_rankings(
    stage2: &[Stage2Result],
    labels: &LabelMap,
) -> Vec<AggregateRank> {
    let mut positions: Vec<(WorkerId, Vec<usize>)> = Vec::new();

    for rater in stage2 {
        for (index, label) in rater.parsed_ranking.iter().enumerate() {
            let Some(worker) = labels.worker_for(label) else {
                continue;
            };
            match positions.iter_mut().find(|(w, _)| w == worker) {
                Some((_, list)) => list.push(index + 1),
                None => positions.push((worker.clone(), vec![index + 1])),
            }
        }
    }

    let mut aggregate: Vec<AggregateRank> = positions
        .into_iter()
        .map(|(model, list)| {
            let mean = list.iter().sum::<usize>() as f64 / list.len() as f64;
            AggregateRank {
                model,
                average_rank: round2(mean),
                rankings_count: list.len(),
            }
        })
        .collect();

    aggregate.sort_by(|a, b| a.average_rank.total_cmp(&b.average_rank));
    aggregate
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//! Peer ranking domain.
//!
//! Stage 2 shows every council worker the stage-1 answers under opaque
//! labels ("Response A", "Response B", ...) and asks for a ranked list.
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`labels::LabelMap`] | Label → worker mapping, rebuilt for every job |
//! | [`parsing::parse_ranking_from_text`] | Best-effort extraction of a rater's order |
//! | [`aggregate::calculate_aggregate_rankings`] | Mean rank position per worker |
//!
//! Parsing is a pure function so the heuristic can change without touching
//! orchestration.

pub mod aggregate;
pub mod labels;
pub mod parsing;

pub use aggregate::calculate_aggregate_rankings;
pub use labels::LabelMap;
pub use parsing::parse_ranking_from_text;

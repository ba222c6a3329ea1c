//! Application-level configuration.
//!
//! - [`CouncilConfig`]: which workers sit on the council
//! - [`ExecutionParams`]: polling intervals, grace periods and budgets

pub mod council_config;
pub mod execution_params;

pub use council_config::{CouncilConfig, MAX_COUNCIL_SIZE};
pub use execution_params::ExecutionParams;

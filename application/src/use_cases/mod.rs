//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod fan_out;
pub mod generate_title;
pub mod job_service;
pub mod run_council;
pub mod run_debate;
pub mod watch_job;

//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod conversation_store;
pub mod job_events;
pub mod job_repository;
pub mod worker_gateway;

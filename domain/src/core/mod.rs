//! Core domain concepts shared across all subdomains.
//!
//! - [`worker::WorkerId`]: opaque identifier of a remote model endpoint
//! - [`query::UserQuery`]: a validated task submitted to the council
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod query;
pub mod worker;

//! Job domain: one run of the three-stage council pipeline.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ─▶ Stage1Running ─▶ Stage1Complete ─┬▶ Stage2Running ─┐
//!                                             └────────────────┴▶ Stage2Complete
//!                                                                   │
//!                              Complete ◀─ Stage3Running ◀──────────┘
//!
//! Any non-terminal state ─▶ Error
//! ```
//!
//! - [`status::JobStatus`] / [`status::Stage`]: the state machine
//! - [`entities::Job`]: the mutable job record held by the job store
//! - [`progress`]: per-worker streaming buffers and control flags
//! - [`value_objects`]: frozen stage outputs and derived metadata

pub mod entities;
pub mod progress;
pub mod status;
pub mod value_objects;

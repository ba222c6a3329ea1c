//! Domain layer for llm-council
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Council
//!
//! A question is answered in three stages:
//!
//! 1. **Stage 1**: every council worker answers independently
//! 2. **Stage 2**: every worker ranks the anonymized stage-1 answers
//! 3. **Stage 3**: a chairman synthesizes answers and rankings
//!
//! ## Job
//!
//! One run of the pipeline is a [`Job`], driven through [`JobStatus`] and
//! observable while it runs. Workers can be skipped individually and
//! stage 1 can be forced to finish early.
//!
//! ## Debate
//!
//! An alternative flow where workers argue in turns picked by a moderator.

pub mod config;
pub mod core;
pub mod debate;
pub mod job;
pub mod prompt;
pub mod ranking;
pub mod session;

// Re-export commonly used types
pub use config::OutputFormat;
pub use core::{error::DomainError, query::UserQuery, worker::WorkerId};
pub use debate::{
    DEFAULT_ROLE_ROTATION, DebateEntry, DebateEvent, DebatePhase, DebatePrompt, DebateRole,
    ModeratorDecision, Participant, TurnKind, assign_participants,
};
pub use job::{
    entities::{ConversationId, Job, JobId},
    progress::{ControlFlags, JobProgress, StageStreams, StreamStatus, WorkerStream},
    status::{JobStatus, Stage},
    value_objects::{
        AggregateRank, INSUFFICIENT_RESPONSES, JobMetadata, SYNTHESIS_FALLBACK, Stage1Result,
        Stage2Result, Stage3Result,
    },
};
pub use prompt::{NEW_CONVERSATION_TITLE, PromptTemplate, clean_title};
pub use ranking::{LabelMap, calculate_aggregate_rankings, parse_ranking_from_text};
pub use session::{
    message::{Message, Role},
    stream::StreamEvent,
};

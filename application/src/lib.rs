//! Application layer for llm-council
//!
//! This crate contains the job store, use cases, port definitions and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod job_store;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{CouncilConfig, ExecutionParams, MAX_COUNCIL_SIZE};
pub use job_store::{CANCELLED_BY_USER, INTERRUPTED_BY_RESTART, JobStore, StoreError};
pub use ports::{
    conversation_store::{
        AssistantMessage, Conversation, ConversationMessage, ConversationStore,
        ConversationStoreError, InMemoryConversationStore,
    },
    job_events::{ControlAction, JobEvent, JobEventLogger, StoreListener},
    job_repository::{InMemoryJobRepository, JobRepository, NoPersistence, PersistenceError},
    worker_gateway::{FailureReason, StreamHandle, WorkerFailure, WorkerGateway},
};
pub use use_cases::fan_out::{FanOutExecutor, FanOutObserver, FanOutReport, WorkerOutcome};
pub use use_cases::generate_title::generate_title;
pub use use_cases::job_service::{JOB_TIMED_OUT, JobService, SubmitError};
pub use use_cases::run_council::{PipelineError, RunCouncilUseCase};
pub use use_cases::run_debate::{
    DEFAULT_MAX_TURNS, DebateInput, DebateTranscript, RunDebateUseCase, UNABLE_TO_RESPOND,
    UNABLE_TO_SUMMARIZE,
};
pub use use_cases::watch_job::{JobWatcher, ProgressEvent};

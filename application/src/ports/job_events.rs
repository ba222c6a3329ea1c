//! Port for structured job audit logging.
//!
//! Defines the [`JobEventLogger`] trait for recording job lifecycle events
//! (creation, status changes, worker outcomes, control signals) to a
//! structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures a
//! machine-readable audit trail (JSONL).

use council_domain::{ConversationId, JobId, JobStatus, Stage, StreamStatus, WorkerId};

/// A job lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    JobCreated {
        job_id: JobId,
        conversation_id: ConversationId,
    },
    StatusChanged {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
        error: Option<String>,
    },
    WorkerStatus {
        job_id: JobId,
        stage: Stage,
        worker: WorkerId,
        status: StreamStatus,
    },
    Control {
        job_id: JobId,
        action: ControlAction,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    Skip(WorkerId),
    ForceContinue,
    Cancel,
}

impl JobEvent {
    /// Event type identifier (e.g., "job_created", "status_changed").
    pub fn event_type(&self) -> &'static str {
        match self {
            JobEvent::JobCreated { .. } => "job_created",
            JobEvent::StatusChanged { .. } => "status_changed",
            JobEvent::WorkerStatus { .. } => "worker_status",
            JobEvent::Control { .. } => "control",
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            JobEvent::JobCreated { job_id, .. }
            | JobEvent::StatusChanged { job_id, .. }
            | JobEvent::WorkerStatus { job_id, .. }
            | JobEvent::Control { job_id, .. } => job_id,
        }
    }
}

/// Push-style hook invoked by the job store after every audited change.
pub trait StoreListener: Send + Sync {
    fn on_event(&self, event: &JobEvent);
}

/// Port for logging job events to a structured log.
///
/// Implementations write each event as a single record (e.g., one JSONL line).
/// The `log` method is synchronous and non-fallible so a broken log never
/// disrupts a running job; write failures are dropped.
pub trait JobEventLogger: Send + Sync {
    fn log(&self, event: &JobEvent);
}

impl<L: JobEventLogger + ?Sized> StoreListener for L {
    fn on_event(&self, event: &JobEvent) {
        self.log(event);
    }
}

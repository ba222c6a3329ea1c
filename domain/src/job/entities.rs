//! Job entity

use crate::core::error::DomainError;
use crate::core::query::UserQuery;
use crate::core::worker::WorkerId;
use crate::job::progress::{ControlFlags, JobProgress, StreamStatus, WorkerStream};
use crate::job::status::{JobStatus, Stage};
use crate::job::value_objects::{JobMetadata, Stage1Result, Stage2Result, Stage3Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier of a job
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the conversation a job belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One run of the council pipeline (Entity)
///
/// A `Job` is owned by the job store and only ever mutated under the store's
/// lock. Snapshots handed to observers are plain clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub conversation_id: ConversationId,
    pub user_query: UserQuery,
    status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stage1: Option<Vec<Stage1Result>>,
    pub stage2: Option<Vec<Stage2Result>>,
    pub stage3: Option<Stage3Result>,
    pub metadata: Option<JobMetadata>,
    error: Option<String>,
    #[serde(default)]
    pub progress: JobProgress,
    #[serde(default)]
    pub control: ControlFlags,
}

impl Job {
    pub fn new(conversation_id: ConversationId, user_query: UserQuery) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::generate(),
            conversation_id,
            user_query,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            stage1: None,
            stage2: None,
            stage3: None,
            metadata: None,
            error: None,
            progress: JobProgress::default(),
            control: ControlFlags::default(),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Advance the lifecycle. Terminal jobs reject every transition.
    pub fn transition_to(&mut self, next: JobStatus) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::AlreadyFinished(self.status));
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Move to `Error` with a human-readable reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        self.transition_to(JobStatus::Error)?;
        self.error = Some(reason.into());
        Ok(())
    }

    /// Initialize streaming buffers for every worker of `stage`.
    pub fn begin_stage(&mut self, stage: Stage, workers: &[WorkerId]) {
        let streams = self.progress.streams_mut(stage);
        for worker in workers {
            streams.entry(worker.clone()).or_default();
        }
        if stage == Stage::Stage1 {
            self.progress.models_total = workers.len();
            // Skips requested while pending apply as soon as streams exist
            let skipped: Vec<WorkerId> = self.control.skipped.iter().cloned().collect();
            for worker in &skipped {
                let changed = self
                    .progress
                    .stage1
                    .get_mut(worker)
                    .is_some_and(|stream| stream.set_status(StreamStatus::Skipped));
                if changed {
                    self.count_outcome(worker, StreamStatus::Skipped);
                }
            }
        }
        self.touch();
    }

    /// Append a chunk to a worker's buffer. Returns false when dropped.
    pub fn record_chunk(&mut self, stage: Stage, worker: &WorkerId, chunk: &str) -> bool {
        if self.is_terminal() {
            return false;
        }
        let appended = self
            .progress
            .streams_mut(stage)
            .entry(worker.clone())
            .or_default()
            .push(chunk);
        if appended {
            self.touch();
        }
        appended
    }

    /// Record a worker's stream status. Returns true when it changed.
    pub fn record_worker_status(
        &mut self,
        stage: Stage,
        worker: &WorkerId,
        status: StreamStatus,
    ) -> bool {
        let changed = self
            .progress
            .streams_mut(stage)
            .entry(worker.clone())
            .or_default()
            .set_status(status);
        if !changed {
            return false;
        }
        if stage == Stage::Stage1 {
            self.count_outcome(worker, status);
        }
        self.touch();
        true
    }

    fn count_outcome(&mut self, worker: &WorkerId, status: StreamStatus) {
        let list = match status {
            StreamStatus::Complete => &mut self.progress.models_responded,
            StreamStatus::Failed | StreamStatus::Skipped => &mut self.progress.models_failed,
            StreamStatus::Streaming => return,
        };
        if !list.contains(worker) {
            list.push(worker.clone());
        }
    }

    /// Whether `mark_skipped` is currently accepted
    pub fn accepts_skip(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Stage1Running)
    }

    /// Flag a stage-1 worker as skipped.
    ///
    /// Idempotent. A worker that already completed keeps its result.
    pub fn mark_skipped(&mut self, worker: &WorkerId) -> bool {
        if !self.accepts_skip() {
            return false;
        }
        let streams = &self.progress.stage1;
        if !streams.is_empty() && !streams.contains_key(worker) {
            return false;
        }
        self.control.skipped.insert(worker.clone());
        let changed = self
            .progress
            .stage1
            .get_mut(worker)
            .is_some_and(|stream| stream.set_status(StreamStatus::Skipped));
        if changed {
            self.count_outcome(worker, StreamStatus::Skipped);
        }
        self.touch();
        true
    }

    pub fn is_skipped(&self, worker: &WorkerId) -> bool {
        self.control.skipped.contains(worker)
    }

    /// Ask stage 1 to stop waiting for stragglers.
    pub fn request_force_finish(&mut self, min_completed: usize) -> bool {
        if self.status != JobStatus::Stage1Running {
            return false;
        }
        if self.progress.completed_count(Stage::Stage1) < min_completed {
            return false;
        }
        self.control.force_continue = true;
        self.touch();
        true
    }

    pub fn should_force_continue(&self) -> bool {
        self.control.force_continue
    }

    /// Whether a terminal job is older than `retention`
    pub fn is_expired(&self, now: DateTime<Utc>, retention: chrono::Duration) -> bool {
        self.is_terminal() && now - self.created_at > retention
    }

    /// Frozen stage-1 outputs (empty before stage 1 completes)
    pub fn stage1_results(&self) -> &[Stage1Result] {
        self.stage1.as_deref().unwrap_or_default()
    }

    /// Frozen stage-2 outputs (empty before stage 2 completes or when skipped)
    pub fn stage2_results(&self) -> &[Stage2Result] {
        self.stage2.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(
            ConversationId::new("conv-1"),
            UserQuery::try_new("What is Rust?").unwrap(),
        )
    }

    fn w(id: &str) -> WorkerId {
        id.parse().unwrap()
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.error().is_none());
        assert_eq!(job.id.as_str().len(), 36);
    }

    #[test]
    fn test_transition_rejects_illegal_jump() {
        let mut job = job();
        let err = job.transition_to(JobStatus::Stage3Running).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { .. }));
        assert_eq!(job.status(), JobStatus::Pending);
    }

    #[test]
    fn test_failed_job_never_completes() {
        let mut job = job();
        job.transition_to(JobStatus::Stage1Running).unwrap();
        job.fail("Job cancelled by user").unwrap();
        assert_eq!(job.error(), Some("Job cancelled by user"));
        assert!(job.transition_to(JobStatus::Stage1Complete).unwrap_err().is_terminal());
        assert!(job.fail("again").is_err());
        assert_eq!(job.error(), Some("Job cancelled by user"));
    }

    #[test]
    fn test_progress_lists_track_stage1_outcomes() {
        let mut job = job();
        job.transition_to(JobStatus::Stage1Running).unwrap();
        job.begin_stage(Stage::Stage1, &[w("a"), w("b")]);
        assert_eq!(job.progress.models_total, 2);

        assert!(job.record_chunk(Stage::Stage1, &w("a"), "hello"));
        assert!(job.record_worker_status(Stage::Stage1, &w("a"), StreamStatus::Complete));
        assert!(job.record_worker_status(Stage::Stage1, &w("b"), StreamStatus::Failed));
        // Duplicate status report is a no-op
        assert!(!job.record_worker_status(Stage::Stage1, &w("a"), StreamStatus::Complete));

        assert_eq!(job.progress.models_responded, vec![w("a")]);
        assert_eq!(job.progress.models_failed, vec![w("b")]);
        assert_eq!(job.progress.stage1[&w("a")].content, "hello");
    }

    #[test]
    fn test_skip_is_idempotent_and_stage1_only() {
        let mut job = job();
        job.transition_to(JobStatus::Stage1Running).unwrap();
        job.begin_stage(Stage::Stage1, &[w("a"), w("b")]);

        assert!(job.mark_skipped(&w("a")));
        let after_first = job.control.clone();
        assert!(job.mark_skipped(&w("a")));
        assert_eq!(job.control, after_first);
        assert_eq!(job.progress.stage1[&w("a")].status, StreamStatus::Skipped);
        assert_eq!(job.progress.models_failed, vec![w("a")]);
        // The cancelled worker's own failure report does not double count
        assert!(!job.record_worker_status(Stage::Stage1, &w("a"), StreamStatus::Failed));
        assert_eq!(job.progress.models_failed.len(), 1);

        assert!(!job.mark_skipped(&w("unknown")));

        job.transition_to(JobStatus::Stage1Complete).unwrap();
        assert!(!job.mark_skipped(&w("b")));
    }

    #[test]
    fn test_skip_after_completion_keeps_result() {
        let mut job = job();
        job.transition_to(JobStatus::Stage1Running).unwrap();
        job.begin_stage(Stage::Stage1, &[w("a")]);
        job.record_chunk(Stage::Stage1, &w("a"), "answer");
        job.record_worker_status(Stage::Stage1, &w("a"), StreamStatus::Complete);

        assert!(job.mark_skipped(&w("a")));
        assert_eq!(job.progress.stage1[&w("a")].status, StreamStatus::Complete);
        assert_eq!(job.progress.stage1[&w("a")].content, "answer");
    }

    #[test]
    fn test_skip_while_pending_applies_on_begin() {
        let mut job = job();
        assert!(job.mark_skipped(&w("b")));
        job.transition_to(JobStatus::Stage1Running).unwrap();
        job.begin_stage(Stage::Stage1, &[w("a"), w("b")]);
        assert_eq!(job.progress.stage1[&w("b")].status, StreamStatus::Skipped);
    }

    #[test]
    fn test_force_finish_requires_min_completed() {
        let mut job = job();
        assert!(!job.request_force_finish(1));

        job.transition_to(JobStatus::Stage1Running).unwrap();
        job.begin_stage(Stage::Stage1, &[w("a"), w("b")]);
        assert!(!job.request_force_finish(1));

        job.record_worker_status(Stage::Stage1, &w("a"), StreamStatus::Complete);
        assert!(!job.request_force_finish(2));
        assert!(job.request_force_finish(1));
        assert!(job.should_force_continue());
    }

    #[test]
    fn test_expiry_only_for_terminal_jobs() {
        let mut job = job();
        job.created_at = Utc::now() - chrono::Duration::hours(48);
        assert!(!job.is_expired(Utc::now(), chrono::Duration::hours(24)));
        job.fail("boom").unwrap();
        assert!(job.is_expired(Utc::now(), chrono::Duration::hours(24)));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let job = job();
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["conversation_id"], "conv-1");
        assert_eq!(json["user_query"], "What is Rust?");
        assert!(json["error"].is_null());
        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }
}

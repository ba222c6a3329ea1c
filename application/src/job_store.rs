//! Job state store
//!
//! The single owner of every [`Job`]. All mutations go through one mutex;
//! state transitions and worker status changes are flushed to the
//! [`JobRepository`] while the lock is held, individual chunks are not.
//! Readers get cloned snapshots.

use crate::ports::job_events::{ControlAction, JobEvent, StoreListener};
use crate::ports::job_repository::{JobRepository, NoPersistence, PersistenceError};
use chrono::{DateTime, Utc};
use council_domain::{
    ConversationId, DomainError, Job, JobId, JobMetadata, JobStatus, Stage, Stage1Result,
    Stage2Result, Stage3Result, StreamStatus, UserQuery, WorkerId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error text of a job cancelled through the control surface
pub const CANCELLED_BY_USER: &str = "Job cancelled by user";

/// Error text of a job found running at startup
pub const INTERRUPTED_BY_RESTART: &str = "Job interrupted by restart";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Conversation {conversation_id} already has an active job {job_id}")]
    ActiveJob {
        conversation_id: ConversationId,
        job_id: JobId,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Failed to load jobs: {0}")]
    Persistence(#[from] PersistenceError),
}

impl StoreError {
    /// The job had already finished (completed, failed or cancelled)
    pub fn is_finished(&self) -> bool {
        matches!(self, StoreError::Domain(e) if e.is_terminal())
    }
}

pub struct JobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
    repository: Arc<dyn JobRepository>,
    listeners: Vec<Arc<dyn StoreListener>>,
}

impl JobStore {
    pub fn new(repository: Arc<dyn JobRepository>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            repository,
            listeners: Vec::new(),
        }
    }

    /// Store without durable backing
    pub fn in_memory() -> Self {
        Self::new(Arc::new(NoPersistence))
    }

    pub fn with_listener(mut self, listener: Arc<dyn StoreListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, job: &Job) {
        if let Err(e) = self.repository.save(job) {
            warn!(job_id = %job.id.short(), error = %e, "Failed to persist job snapshot");
        }
    }

    fn emit(&self, events: &[JobEvent]) {
        for event in events {
            for listener in &self.listeners {
                listener.on_event(event);
            }
        }
    }

    // ==================== Lifecycle ====================

    /// Load every persisted snapshot into memory. Returns how many were read.
    pub fn load(&self) -> Result<usize, StoreError> {
        let loaded = self.repository.load_all()?;
        let count = loaded.len();
        let mut jobs = self.lock();
        for job in loaded {
            jobs.insert(job.id.clone(), job);
        }
        debug!(count, "Loaded job snapshots");
        Ok(count)
    }

    /// Mark every non-terminal job created at or before `cutoff` as failed.
    ///
    /// Jobs created later may belong to another process sharing the same
    /// repository and are left alone.
    pub fn recover_orphaned(&self, cutoff: DateTime<Utc>) -> Vec<JobId> {
        let mut events = Vec::new();
        let mut recovered = Vec::new();
        {
            let mut jobs = self.lock();
            for job in jobs
                .values_mut()
                .filter(|j| !j.is_terminal() && j.created_at <= cutoff)
            {
                let from = job.status();
                if job.fail(INTERRUPTED_BY_RESTART).is_ok() {
                    self.persist(job);
                    events.push(status_event(job, from));
                    recovered.push(job.id.clone());
                }
            }
        }
        if !recovered.is_empty() {
            info!(count = recovered.len(), "Recovered orphaned jobs");
        }
        self.emit(&events);
        recovered
    }

    pub fn create(&self, conversation_id: ConversationId, query: UserQuery) -> Job {
        let job = Job::new(conversation_id, query);
        {
            let mut jobs = self.lock();
            self.persist(&job);
            jobs.insert(job.id.clone(), job.clone());
        }
        self.emit(&[created_event(&job)]);
        job
    }

    /// Create a job unless the conversation already has an active one.
    ///
    /// Check and insert happen under one lock acquisition.
    pub fn create_if_idle(
        &self,
        conversation_id: ConversationId,
        query: UserQuery,
    ) -> Result<Job, StoreError> {
        let job = {
            let mut jobs = self.lock();
            if let Some(active) = active_for(&jobs, &conversation_id) {
                return Err(StoreError::ActiveJob {
                    conversation_id,
                    job_id: active.id.clone(),
                });
            }
            let job = Job::new(conversation_id, query);
            self.persist(&job);
            jobs.insert(job.id.clone(), job.clone());
            job
        };
        self.emit(&[created_event(&job)]);
        Ok(job)
    }

    // ==================== Queries ====================

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.lock().get(id).cloned()
    }

    /// The conversation's active (non-terminal) job
    pub fn get_for_conversation(&self, conversation_id: &ConversationId) -> Option<Job> {
        active_for(&self.lock(), conversation_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self, id: &JobId) -> bool {
        self.lock().get(id).is_some_and(|j| !j.is_terminal())
    }

    pub fn is_skipped(&self, id: &JobId, worker: &WorkerId) -> bool {
        self.lock().get(id).is_some_and(|j| j.is_skipped(worker))
    }

    pub fn should_force_continue(&self, id: &JobId) -> bool {
        self.lock().get(id).is_some_and(|j| j.should_force_continue())
    }

    // ==================== Transitions ====================

    /// Apply `f` to the job under the lock, flush, and report a status
    /// change if one happened.
    fn mutate<R>(
        &self,
        id: &JobId,
        f: impl FnOnce(&mut Job) -> Result<R, DomainError>,
    ) -> Result<R, StoreError> {
        let (out, event) = {
            let mut jobs = self.lock();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let from = job.status();
            let out = f(job)?;
            self.persist(job);
            let event = (job.status() != from).then(|| status_event(job, from));
            (out, event)
        };
        if let Some(event) = event {
            self.emit(&[event]);
        }
        Ok(out)
    }

    pub fn transition(&self, id: &JobId, next: JobStatus) -> Result<(), StoreError> {
        self.mutate(id, |job| job.transition_to(next))
    }

    /// Enter `stage`'s running status and create a buffer for each worker
    pub fn begin_stage(
        &self,
        id: &JobId,
        stage: Stage,
        workers: &[WorkerId],
    ) -> Result<(), StoreError> {
        self.mutate(id, |job| {
            job.transition_to(stage.running_status())?;
            job.begin_stage(stage, workers);
            Ok(())
        })
    }

    pub fn freeze_stage1(&self, id: &JobId, results: Vec<Stage1Result>) -> Result<(), StoreError> {
        self.mutate(id, |job| {
            job.transition_to(JobStatus::Stage1Complete)?;
            job.stage1 = Some(results);
            Ok(())
        })
    }

    pub fn freeze_stage2(
        &self,
        id: &JobId,
        results: Vec<Stage2Result>,
        metadata: JobMetadata,
    ) -> Result<(), StoreError> {
        self.mutate(id, |job| {
            job.transition_to(JobStatus::Stage2Complete)?;
            job.stage2 = Some(results);
            job.metadata = Some(metadata);
            Ok(())
        })
    }

    pub fn complete(&self, id: &JobId, result: Stage3Result) -> Result<(), StoreError> {
        self.mutate(id, |job| {
            job.transition_to(JobStatus::Complete)?;
            job.stage3 = Some(result);
            Ok(())
        })
    }

    /// Move the job to `Error`. Returns false if it had already finished.
    pub fn fail(&self, id: &JobId, reason: impl Into<String>) -> Result<bool, StoreError> {
        match self.mutate(id, |job| job.fail(reason)) {
            Ok(()) => Ok(true),
            Err(e) if e.is_finished() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Cancel a running job. Finished or unknown jobs are left untouched.
    pub fn cancel(&self, id: &JobId) -> bool {
        let cancelled = matches!(self.fail(id, CANCELLED_BY_USER), Ok(true));
        if cancelled {
            self.emit(&[JobEvent::Control {
                job_id: id.clone(),
                action: ControlAction::Cancel,
            }]);
        }
        cancelled
    }

    // ==================== Streaming progress ====================

    /// Append a chunk to a worker's buffer. Not flushed.
    pub fn record_chunk(&self, id: &JobId, stage: Stage, worker: &WorkerId, chunk: &str) -> bool {
        self.lock()
            .get_mut(id)
            .is_some_and(|job| job.record_chunk(stage, worker, chunk))
    }

    pub fn record_worker_status(
        &self,
        id: &JobId,
        stage: Stage,
        worker: &WorkerId,
        status: StreamStatus,
    ) -> bool {
        let changed = {
            let mut jobs = self.lock();
            let Some(job) = jobs.get_mut(id) else {
                return false;
            };
            let changed = job.record_worker_status(stage, worker, status);
            if changed {
                self.persist(job);
            }
            changed
        };
        if changed {
            self.emit(&[JobEvent::WorkerStatus {
                job_id: id.clone(),
                stage,
                worker: worker.clone(),
                status,
            }]);
        }
        changed
    }

    // ==================== Control ====================

    /// Skip one stage-1 worker. Returns false outside stage 1.
    pub fn mark_skipped(&self, id: &JobId, worker: &WorkerId) -> Result<bool, StoreError> {
        let accepted = {
            let mut jobs = self.lock();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let accepted = job.mark_skipped(worker);
            if accepted {
                self.persist(job);
            }
            accepted
        };
        if accepted {
            self.emit(&[JobEvent::Control {
                job_id: id.clone(),
                action: ControlAction::Skip(worker.clone()),
            }]);
        }
        Ok(accepted)
    }

    /// Stop waiting for stage-1 stragglers once `min_completed` workers
    /// have answered.
    pub fn request_force_finish(&self, id: &JobId, min_completed: usize) -> Result<bool, StoreError> {
        let accepted = {
            let mut jobs = self.lock();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let accepted = job.request_force_finish(min_completed);
            if accepted {
                self.persist(job);
            }
            accepted
        };
        if accepted {
            self.emit(&[JobEvent::Control {
                job_id: id.clone(),
                action: ControlAction::ForceContinue,
            }]);
        }
        Ok(accepted)
    }

    // ==================== Retention ====================

    /// Remove finished jobs older than `retention`. Returns how many went.
    pub fn cleanup_old_jobs(&self, retention: chrono::Duration) -> usize {
        let now = Utc::now();
        let mut jobs = self.lock();
        let expired: Vec<JobId> = jobs
            .values()
            .filter(|j| j.is_expired(now, retention))
            .map(|j| j.id.clone())
            .collect();
        for id in &expired {
            jobs.remove(id);
            if let Err(e) = self.repository.remove(id) {
                warn!(job_id = %id.short(), error = %e, "Failed to delete job snapshot");
            }
        }
        expired.len()
    }
}

fn active_for<'a>(jobs: &'a HashMap<JobId, Job>, conversation_id: &ConversationId) -> Option<&'a Job> {
    jobs.values()
        .find(|j| &j.conversation_id == conversation_id && !j.is_terminal())
}

fn created_event(job: &Job) -> JobEvent {
    JobEvent::JobCreated {
        job_id: job.id.clone(),
        conversation_id: job.conversation_id.clone(),
    }
}

fn status_event(job: &Job, from: JobStatus) -> JobEvent {
    JobEvent::StatusChanged {
        job_id: job.id.clone(),
        from,
        to: job.status(),
        error: job.error().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::job_repository::InMemoryJobRepository;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<JobEvent>>,
    }

    impl StoreListener for RecordingListener {
        fn on_event(&self, event: &JobEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn w(s: &str) -> WorkerId {
        s.parse().unwrap()
    }

    fn query() -> UserQuery {
        UserQuery::try_new("Why is the sky blue?").unwrap()
    }

    fn store_with_repo() -> (JobStore, Arc<InMemoryJobRepository>) {
        let repo = Arc::new(InMemoryJobRepository::new());
        (JobStore::new(repo.clone()), repo)
    }

    #[test]
    fn test_create_and_get() {
        let store = JobStore::in_memory();
        let job = store.create(ConversationId::new("c1"), query());
        let fetched = store.get(&job.id).unwrap();
        assert_eq!(fetched.status(), JobStatus::Pending);
        assert!(store.is_running(&job.id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_for_conversation_returns_active_only() {
        let store = JobStore::in_memory();
        let conv = ConversationId::new("c1");
        let job = store.create(conv.clone(), query());
        assert_eq!(store.get_for_conversation(&conv).unwrap().id, job.id);

        assert!(store.fail(&job.id, "boom").unwrap());
        assert!(store.get_for_conversation(&conv).is_none());
    }

    #[test]
    fn test_create_if_idle_rejects_second_job() {
        let store = JobStore::in_memory();
        let conv = ConversationId::new("c1");
        let first = store.create_if_idle(conv.clone(), query()).unwrap();
        let err = store.create_if_idle(conv.clone(), query()).unwrap_err();
        match err {
            StoreError::ActiveJob { job_id, .. } => assert_eq!(job_id, first.id),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.len(), 1);

        store.cancel(&first.id);
        assert!(store.create_if_idle(conv, query()).is_ok());
    }

    #[test]
    fn test_transitions_flush_but_chunks_do_not() {
        let (store, repo) = store_with_repo();
        let job = store.create(ConversationId::new("c1"), query());
        store.begin_stage(&job.id, Stage::Stage1, &[w("a")]).unwrap();
        assert_eq!(repo.snapshot(&job.id).unwrap().status(), JobStatus::Stage1Running);

        assert!(store.record_chunk(&job.id, Stage::Stage1, &w("a"), "partial"));
        assert_eq!(repo.snapshot(&job.id).unwrap().progress.stage1[&w("a")].content, "");
        assert_eq!(store.get(&job.id).unwrap().progress.stage1[&w("a")].content, "partial");

        assert!(store.record_worker_status(&job.id, Stage::Stage1, &w("a"), StreamStatus::Complete));
        assert_eq!(
            repo.snapshot(&job.id).unwrap().progress.stage1[&w("a")].content,
            "partial"
        );
    }

    #[test]
    fn test_full_pipeline_sequence() {
        let store = JobStore::in_memory();
        let id = store.create(ConversationId::new("c1"), query()).id;
        store.begin_stage(&id, Stage::Stage1, &[w("a"), w("b")]).unwrap();
        store
            .freeze_stage1(&id, vec![Stage1Result::new(w("a"), "x"), Stage1Result::new(w("b"), "y")])
            .unwrap();
        store.begin_stage(&id, Stage::Stage2, &[w("a"), w("b")]).unwrap();
        store.freeze_stage2(&id, vec![], JobMetadata::default()).unwrap();
        store.begin_stage(&id, Stage::Stage3, &[w("chair")]).unwrap();
        store.complete(&id, Stage3Result::new(w("chair"), "done")).unwrap();

        let job = store.get(&id).unwrap();
        assert_eq!(job.status(), JobStatus::Complete);
        assert_eq!(job.stage1_results().len(), 2);
        assert_eq!(job.stage3.unwrap().response, "done");
    }

    #[test]
    fn test_cancel_finished_job_is_rejected() {
        let store = JobStore::in_memory();
        let id = store.create(ConversationId::new("c1"), query()).id;
        assert!(store.cancel(&id));
        assert_eq!(store.get(&id).unwrap().error(), Some(CANCELLED_BY_USER));

        assert!(!store.cancel(&id));
        assert!(!store.cancel(&JobId::from("missing")));
        assert!(store.begin_stage(&id, Stage::Stage1, &[w("a")]).unwrap_err().is_finished());
        assert_eq!(store.get(&id).unwrap().status(), JobStatus::Error);
    }

    #[test]
    fn test_skip_and_force_finish() {
        let store = JobStore::in_memory();
        let id = store.create(ConversationId::new("c1"), query()).id;
        store.begin_stage(&id, Stage::Stage1, &[w("a"), w("b")]).unwrap();

        assert!(store.mark_skipped(&id, &w("b")).unwrap());
        assert!(store.is_skipped(&id, &w("b")));
        assert!(!store.request_force_finish(&id, 1).unwrap());

        store.record_worker_status(&id, Stage::Stage1, &w("a"), StreamStatus::Complete);
        assert!(store.request_force_finish(&id, 1).unwrap());
        assert!(store.should_force_continue(&id));

        assert!(matches!(
            store.mark_skipped(&JobId::from("missing"), &w("a")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_recover_orphaned_after_restart() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let (running, done) = {
            let store = JobStore::new(repo.clone());
            let running = store.create(ConversationId::new("c1"), query()).id;
            store.begin_stage(&running, Stage::Stage1, &[w("a")]).unwrap();
            let done = store.create(ConversationId::new("c2"), query()).id;
            store.fail(&done, "earlier failure").unwrap();
            (running, done)
        };

        let store = JobStore::new(repo.clone());
        assert_eq!(store.load().unwrap(), 2);
        assert_eq!(store.recover_orphaned(Utc::now()), vec![running.clone()]);

        let job = store.get(&running).unwrap();
        assert_eq!(job.status(), JobStatus::Error);
        assert_eq!(job.error(), Some(INTERRUPTED_BY_RESTART));
        assert_eq!(store.get(&done).unwrap().error(), Some("earlier failure"));
        assert_eq!(repo.snapshot(&running).unwrap().status(), JobStatus::Error);
    }

    #[test]
    fn test_recover_leaves_recent_jobs_alone() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let other = JobStore::new(repo.clone());
        let live = other.create(ConversationId::new("c1"), query()).id;
        other.begin_stage(&live, Stage::Stage1, &[w("a")]).unwrap();

        let store = JobStore::new(repo.clone());
        store.load().unwrap();
        let cutoff = Utc::now() - chrono::Duration::minutes(10);
        assert!(store.recover_orphaned(cutoff).is_empty());
        assert_eq!(store.get(&live).unwrap().status(), JobStatus::Stage1Running);
        assert_eq!(repo.snapshot(&live).unwrap().status(), JobStatus::Stage1Running);
    }

    #[test]
    fn test_cleanup_removes_expired_finished_jobs() {
        let (store, repo) = store_with_repo();
        let old = store.create(ConversationId::new("c1"), query()).id;
        let active = store.create(ConversationId::new("c2"), query()).id;
        store.fail(&old, "x").unwrap();
        {
            let mut jobs = store.lock();
            for job in jobs.values_mut() {
                job.created_at = Utc::now() - chrono::Duration::hours(30);
            }
        }

        assert_eq!(store.cleanup_old_jobs(chrono::Duration::hours(24)), 1);
        assert!(store.get(&old).is_none());
        assert!(repo.snapshot(&old).is_none());
        assert!(store.get(&active).is_some());
    }

    #[test]
    fn test_listener_sees_audited_changes() {
        let listener = Arc::new(RecordingListener::default());
        let store = JobStore::in_memory().with_listener(listener.clone());
        let id = store.create(ConversationId::new("c1"), query()).id;
        store.begin_stage(&id, Stage::Stage1, &[w("a")]).unwrap();
        store.record_chunk(&id, Stage::Stage1, &w("a"), "hi");
        store.record_worker_status(&id, Stage::Stage1, &w("a"), StreamStatus::Complete);
        store.cancel(&id);

        let types: Vec<_> = listener
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type())
            .collect();
        assert_eq!(
            types,
            vec!["job_created", "status_changed", "worker_status", "status_changed", "control"]
        );
    }
}

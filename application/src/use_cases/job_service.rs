//! Job service
//!
//! Entry point for submitting and controlling council jobs. The service owns
//! the background tasks: one pipeline task per job, an optional title task per
//! new conversation, and the periodic cleanup sweep.

use crate::config::{CouncilConfig, ExecutionParams};
use crate::job_store::{JobStore, StoreError};
use crate::ports::conversation_store::{ConversationStore, ConversationStoreError};
use crate::ports::worker_gateway::WorkerGateway;
use crate::use_cases::generate_title::generate_title;
use crate::use_cases::run_council::RunCouncilUseCase;
use crate::use_cases::watch_job::JobWatcher;
use council_domain::{ConversationId, Job, JobId, UserQuery, WorkerId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Error message of a job that ran past its budget
pub const JOB_TIMED_OUT: &str = "Job timed out";

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Conversation {conversation_id} already has an active job: {job_id}")]
    ActiveJob {
        conversation_id: ConversationId,
        job_id: JobId,
    },

    #[error(transparent)]
    Conversation(#[from] ConversationStoreError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SubmitError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ActiveJob {
                conversation_id,
                job_id,
            } => SubmitError::ActiveJob {
                conversation_id,
                job_id,
            },
            other => SubmitError::Store(other),
        }
    }
}

type HandleMap = HashMap<JobId, JoinHandle<()>>;

pub struct JobService<G: WorkerGateway + 'static> {
    gateway: Arc<G>,
    store: Arc<JobStore>,
    conversations: Arc<dyn ConversationStore>,
    pipeline: Arc<RunCouncilUseCase<G>>,
    params: ExecutionParams,
    handles: Arc<Mutex<HandleMap>>,
}

impl<G: WorkerGateway + 'static> JobService<G> {
    pub fn new(
        gateway: Arc<G>,
        store: Arc<JobStore>,
        conversations: Arc<dyn ConversationStore>,
        council: CouncilConfig,
        params: ExecutionParams,
    ) -> Self {
        let pipeline = Arc::new(RunCouncilUseCase::new(
            gateway.clone(),
            store.clone(),
            conversations.clone(),
            council,
            &params,
        ));
        Self {
            gateway,
            store,
            conversations,
            pipeline,
            params,
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn council(&self) -> &CouncilConfig {
        self.pipeline.council()
    }

    fn handles(&self) -> MutexGuard<'_, HandleMap> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load persisted jobs and fail the ones a previous process left running.
    ///
    /// Only jobs older than the job timeout count as orphaned: a younger
    /// unfinished job may still be owned by another running process.
    pub fn recover(&self) -> Result<Vec<JobId>, StoreError> {
        self.store.load()?;
        let cutoff = chrono::Duration::from_std(self.params.job_timeout)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(self.store.recover_orphaned(cutoff))
    }

    /// Create the job, record the user message and start its pipeline.
    ///
    /// Rejected without touching any worker or the conversation if the
    /// conversation already has an active job.
    pub async fn submit(
        &self,
        conversation_id: ConversationId,
        query: UserQuery,
    ) -> Result<Job, SubmitError> {
        let job = self.store.create_if_idle(conversation_id.clone(), query.clone())?;

        let is_first = match self.record_user_message(&conversation_id, &query).await {
            Ok(is_first) => is_first,
            Err(e) => {
                if let Err(fail) = self.store.fail(&job.id, e.to_string()) {
                    warn!(job_id = %job.id.short(), error = %fail, "Could not fail job");
                }
                return Err(e.into());
            }
        };
        info!(
            job_id = %job.id.short(),
            conversation_id = %conversation_id,
            "Job submitted"
        );

        if is_first {
            self.spawn_title(conversation_id, query);
        }

        let handle = self.spawn_pipeline(job.id.clone());
        let mut handles = self.handles();
        handles.retain(|_, h| !h.is_finished());
        handles.insert(job.id.clone(), handle);

        Ok(job)
    }

    /// Append the user message; true if it opened the conversation
    async fn record_user_message(
        &self,
        conversation_id: &ConversationId,
        query: &UserQuery,
    ) -> Result<bool, ConversationStoreError> {
        let is_first = self.conversations.message_count(conversation_id).await? == 0;
        self.conversations
            .add_user_message(conversation_id, query.content())
            .await?;
        Ok(is_first)
    }

    fn spawn_pipeline(&self, job_id: JobId) -> JoinHandle<()> {
        let pipeline = self.pipeline.clone();
        let store = self.store.clone();
        let timeout = self.params.job_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, pipeline.execute(&job_id)).await {
                Ok(Ok(())) => debug!(job_id = %job_id.short(), "Pipeline finished"),
                Ok(Err(_)) => {}
                Err(_) => {
                    warn!(job_id = %job_id.short(), timeout_secs = timeout.as_secs(), "Job timed out");
                    if let Err(e) = store.fail(&job_id, JOB_TIMED_OUT) {
                        warn!(job_id = %job_id.short(), error = %e, "Could not record timeout");
                    }
                }
            }
        })
    }

    fn spawn_title(&self, conversation_id: ConversationId, query: UserQuery) {
        let gateway = self.gateway.clone();
        let conversations = self.conversations.clone();
        let model = self.council().title_model.clone();

        tokio::spawn(async move {
            let title = generate_title(gateway.as_ref(), &model, &query).await;
            if let Err(e) = conversations.update_title(&conversation_id, &title).await {
                warn!(conversation_id = %conversation_id, error = %e, "Could not store title");
            }
        });
    }

    // ==================== Control ====================

    pub fn skip_worker(&self, job_id: &JobId, worker: &WorkerId) -> Result<bool, StoreError> {
        self.store.mark_skipped(job_id, worker)
    }

    /// Stop waiting for the remaining stage-1 workers once at least one has
    /// answered
    pub fn force_continue(&self, job_id: &JobId) -> Result<bool, StoreError> {
        self.store.request_force_finish(job_id, 1)
    }

    /// Cancel a job and stop its pipeline. Returns false if the job had
    /// already finished.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let cancelled = self.store.cancel(job_id);
        if let Some(handle) = self.handles().remove(job_id) {
            handle.abort();
        }
        if cancelled {
            info!(job_id = %job_id.short(), "Job cancelled");
        }
        cancelled
    }

    pub fn watch(&self, job_id: &JobId) -> JobWatcher {
        JobWatcher::new(self.store.clone(), job_id.clone(), self.params.watch_interval)
    }

    /// Wait until the pipeline task of `job_id` has ended
    pub async fn wait(&self, job_id: &JobId) {
        let handle = self.handles().remove(job_id);
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(job_id = %job_id.short(), error = %e, "Pipeline task ended abnormally");
        }
    }

    // ==================== Retention ====================

    pub fn cleanup_old_jobs(&self) -> usize {
        self.store.cleanup_old_jobs(self.params.retention_chrono())
    }

    /// Run [`Self::cleanup_old_jobs`] every `cleanup_interval` until `cancel`
    /// fires.
    pub fn spawn_cleanup_sweep(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let store = self.store.clone();
        let retention = self.params.retention_chrono();
        let period = self.params.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.cleanup_old_jobs(retention);
                        if removed > 0 {
                            debug!(removed, "Cleanup sweep removed jobs");
                        }
                    }
                }
            }
        })
    }
}

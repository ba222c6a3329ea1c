//! Run Council use case
//!
//! Drives one job through the three council stages:
//!
//! 1. fan the question out to every council worker
//! 2. have every worker rank the anonymized stage-1 answers
//! 3. ask the chairman for a synthesis
//!
//! Every stage boundary is written to the job store and, as a partial
//! assistant message, to the conversation store.

use crate::config::{CouncilConfig, ExecutionParams};
use crate::job_store::{JobStore, StoreError};
use crate::ports::conversation_store::{AssistantMessage, ConversationStore};
use crate::ports::worker_gateway::WorkerGateway;
use crate::use_cases::fan_out::{FanOutExecutor, FanOutObserver, WorkerOutcome};
use council_domain::{
    ConversationId, INSUFFICIENT_RESPONSES, JobId, JobMetadata, LabelMap, Message, PromptTemplate,
    Stage, Stage1Result, Stage2Result, Stage3Result, UserQuery, WorkerId,
    calculate_aggregate_rankings, parse_ranking_from_text,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that end a council job
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("all-workers-failed")]
    AllWorkersFailed,

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// The job was finished from outside (cancelled, timed out) while the
    /// pipeline was still running
    pub fn is_interrupted(&self) -> bool {
        matches!(self, PipelineError::Store(e) if e.is_finished())
    }
}

/// Use case for running a council job
pub struct RunCouncilUseCase<G: WorkerGateway + 'static> {
    store: Arc<JobStore>,
    conversations: Arc<dyn ConversationStore>,
    council: CouncilConfig,
    executor: FanOutExecutor<G>,
}

impl<G: WorkerGateway + 'static> RunCouncilUseCase<G> {
    pub fn new(
        gateway: Arc<G>,
        store: Arc<JobStore>,
        conversations: Arc<dyn ConversationStore>,
        council: CouncilConfig,
        params: &ExecutionParams,
    ) -> Self {
        Self {
            store,
            conversations,
            council,
            executor: FanOutExecutor::new(gateway, params.force_poll_interval, params.cancel_grace),
        }
    }

    pub fn council(&self) -> &CouncilConfig {
        &self.council
    }

    /// Run every stage of `job_id`. Failures are recorded on the job before
    /// being returned.
    pub async fn execute(&self, job_id: &JobId) -> Result<(), PipelineError> {
        let result = self.run_stages(job_id).await;
        if let Err(e) = &result {
            if e.is_interrupted() {
                info!(job_id = %job_id.short(), "Job finished externally, pipeline stopped");
            } else {
                error!(job_id = %job_id.short(), error = %e, "Council job failed");
                if let Err(fail_err) = self.store.fail(job_id, e.to_string()) {
                    warn!(job_id = %job_id.short(), error = %fail_err, "Could not record job failure");
                }
            }
        }
        result
    }

    async fn run_stages(&self, job_id: &JobId) -> Result<(), PipelineError> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| PipelineError::JobNotFound(job_id.clone()))?;
        let query = job.user_query;
        let conversation_id = job.conversation_id;

        info!(
            job_id = %job_id.short(),
            workers = self.council.models.len(),
            "Starting council job"
        );

        // Stage 1: independent answers
        let stage1 = self.stage1(job_id, &query).await?;
        if stage1.is_empty() {
            return Err(PipelineError::AllWorkersFailed);
        }
        self.store.freeze_stage1(job_id, stage1.clone())?;
        self.save_message(
            &conversation_id,
            AssistantMessage {
                stage1: Some(stage1.clone()),
                partial: true,
                ..Default::default()
            },
        )
        .await;

        // Stage 2: peer ranking, only when there is something to compare
        let (stage2, metadata) = if stage1.len() < 2 {
            info!(job_id = %job_id.short(), "Single response, skipping peer ranking");
            (Vec::new(), JobMetadata::skipped(INSUFFICIENT_RESPONSES))
        } else {
            self.stage2(job_id, &query, &stage1).await?
        };
        self.store
            .freeze_stage2(job_id, stage2.clone(), metadata.clone())?;
        self.save_message(
            &conversation_id,
            AssistantMessage {
                stage1: Some(stage1.clone()),
                stage2: Some(stage2.clone()),
                metadata: Some(metadata.clone()),
                partial: true,
                ..Default::default()
            },
        )
        .await;

        // Stage 3: chairman synthesis
        let stage3 = self.stage3(job_id, &query, &stage1, &stage2).await?;
        self.store.complete(job_id, stage3.clone())?;
        self.save_message(
            &conversation_id,
            AssistantMessage {
                stage1: Some(stage1),
                stage2: Some(stage2),
                stage3: Some(stage3),
                metadata: Some(metadata),
                partial: false,
            },
        )
        .await;

        info!(job_id = %job_id.short(), "Council job complete");
        Ok(())
    }

    /// Stage 1: query all council workers in parallel
    async fn stage1(
        &self,
        job_id: &JobId,
        query: &UserQuery,
    ) -> Result<Vec<Stage1Result>, PipelineError> {
        info!(job_id = %job_id.short(), "Stage 1: collecting individual responses");
        self.store
            .begin_stage(job_id, Stage::Stage1, &self.council.models)?;

        let report = self
            .executor
            .run(
                &self.council.models,
                vec![Message::user(PromptTemplate::stage1_prompt(query))],
                self.observer(job_id, Stage::Stage1),
            )
            .await;

        info!(
            job_id = %job_id.short(),
            responded = report.results.len(),
            failed = report.failed.len(),
            forced = report.forced,
            "Stage 1 finished"
        );
        Ok(report
            .results
            .into_iter()
            .map(|(model, response)| Stage1Result::new(model, response))
            .collect())
    }

    /// Stage 2: every worker ranks the anonymized stage-1 answers
    async fn stage2(
        &self,
        job_id: &JobId,
        query: &UserQuery,
        stage1: &[Stage1Result],
    ) -> Result<(Vec<Stage2Result>, JobMetadata), PipelineError> {
        info!(job_id = %job_id.short(), "Stage 2: collecting peer rankings");
        self.store
            .begin_stage(job_id, Stage::Stage2, &self.council.models)?;

        let labels = LabelMap::assign(stage1);
        let prompt = PromptTemplate::ranking_prompt(query, &labels, stage1);
        let report = self
            .executor
            .run(
                &self.council.models,
                vec![Message::user(prompt)],
                self.observer(job_id, Stage::Stage2),
            )
            .await;

        let stage2: Vec<Stage2Result> = report
            .results
            .into_iter()
            .map(|(model, ranking)| {
                let parsed_ranking = parse_ranking_from_text(&ranking);
                if parsed_ranking.is_empty() {
                    warn!(job_id = %job_id.short(), worker = %model, "No ranking found in evaluation");
                }
                Stage2Result {
                    model,
                    ranking,
                    parsed_ranking,
                }
            })
            .collect();

        let aggregate_rankings = calculate_aggregate_rankings(&stage2, &labels);
        debug!(job_id = %job_id.short(), ranked = aggregate_rankings.len(), "Aggregate computed");

        Ok((
            stage2,
            JobMetadata {
                label_to_model: labels,
                aggregate_rankings,
                skipped_reason: None,
            },
        ))
    }

    /// Stage 3: the chairman synthesizes answers and rankings
    async fn stage3(
        &self,
        job_id: &JobId,
        query: &UserQuery,
        stage1: &[Stage1Result],
        stage2: &[Stage2Result],
    ) -> Result<Stage3Result, PipelineError> {
        info!(job_id = %job_id.short(), chairman = %self.council.chairman, "Stage 3: synthesis");
        let chairman = self.council.chairman.clone();
        self.store
            .begin_stage(job_id, Stage::Stage3, std::slice::from_ref(&chairman))?;

        let prompt = PromptTemplate::chairman_prompt(query, stage1, stage2);
        let report = self
            .executor
            .run(
                std::slice::from_ref(&chairman),
                vec![Message::user(prompt)],
                self.observer(job_id, Stage::Stage3),
            )
            .await;

        Ok(match report.results.into_iter().next() {
            Some((model, response)) => Stage3Result::new(model, response),
            None => {
                warn!(job_id = %job_id.short(), "Chairman failed, using fallback synthesis");
                Stage3Result::fallback(chairman)
            }
        })
    }

    fn observer(&self, job_id: &JobId, stage: Stage) -> Arc<dyn FanOutObserver> {
        Arc::new(StageObserver {
            store: Arc::clone(&self.store),
            job_id: job_id.clone(),
            stage,
        })
    }

    async fn save_message(&self, conversation_id: &ConversationId, message: AssistantMessage) {
        if let Err(e) = self
            .conversations
            .save_partial_assistant_message(conversation_id, message)
            .await
        {
            warn!(conversation_id = %conversation_id, error = %e, "Failed to save assistant message");
        }
    }
}

/// Bridges fan-out callbacks to the job store for one stage.
///
/// Skip and force-finish only apply to stage 1.
struct StageObserver {
    store: Arc<JobStore>,
    job_id: JobId,
    stage: Stage,
}

impl FanOutObserver for StageObserver {
    fn on_chunk(&self, worker: &WorkerId, chunk: &str) {
        self.store.record_chunk(&self.job_id, self.stage, worker, chunk);
    }

    fn on_worker_done(&self, worker: &WorkerId, outcome: &WorkerOutcome) {
        self.store
            .record_worker_status(&self.job_id, self.stage, worker, outcome.stream_status());
    }

    fn should_skip(&self, worker: &WorkerId) -> bool {
        self.stage == Stage::Stage1 && self.store.is_skipped(&self.job_id, worker)
    }

    fn should_force_finish(&self) -> bool {
        self.stage == Stage::Stage1 && self.store.should_force_continue(&self.job_id)
    }
}

//! Job watcher
//!
//! Read-only observation of a running job. The watcher polls snapshots from
//! the job store and turns the differences between them into
//! [`ProgressEvent`]s. Stage completions are reported even when polling
//! missed the transient status, and the stream always ends with exactly one
//! terminal event.

use crate::job_store::JobStore;
use council_domain::{
    Job, JobId, JobMetadata, JobStatus, Stage, Stage1Result, Stage2Result, Stage3Result,
    StageStreams,
};
use futures::Stream;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

const STAGES: [Stage; 3] = [Stage::Stage1, Stage::Stage2, Stage::Stage3];

/// Something an observer of a job can react to
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    JobStarted { job_id: JobId },
    StageStarted(Stage),
    /// Current per-worker buffers of the running stage
    StageProgress { stage: Stage, streams: StageStreams },
    Stage1Complete(Vec<Stage1Result>),
    Stage2Complete {
        results: Vec<Stage2Result>,
        metadata: JobMetadata,
    },
    Stage3Complete(Stage3Result),
    /// Final snapshot of a job that finished every stage
    Complete(Box<Job>),
    /// The job failed or was cancelled; `job` is its final snapshot, absent
    /// when the job no longer exists
    Error {
        message: String,
        job: Option<Box<Job>>,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete(_) | ProgressEvent::Error { .. })
    }

    /// The job snapshot carried by a terminal event
    pub fn final_job(&self) -> Option<&Job> {
        match self {
            ProgressEvent::Complete(job) => Some(job.as_ref()),
            ProgressEvent::Error { job, .. } => job.as_deref(),
            _ => None,
        }
    }
}

pub struct JobWatcher {
    store: Arc<JobStore>,
    job_id: JobId,
    interval: Duration,
    queue: VecDeque<ProgressEvent>,
    started: bool,
    stage_started: [bool; 3],
    stage_done: [bool; 3],
    last_streams: Option<(Stage, StageStreams)>,
    polled: bool,
    finished: bool,
}

impl JobWatcher {
    pub fn new(store: Arc<JobStore>, job_id: JobId, interval: Duration) -> Self {
        Self {
            store,
            job_id,
            interval,
            queue: VecDeque::new(),
            started: false,
            stage_started: [false; 3],
            stage_done: [false; 3],
            last_streams: None,
            polled: false,
            finished: false,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Next event, polling the store as needed. `None` after the terminal
    /// event.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }
            if self.polled {
                tokio::time::sleep(self.interval).await;
            }
            self.polled = true;
            self.poll();
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        futures::stream::unfold(self, |mut watcher| async move {
            watcher.next_event().await.map(|event| (event, watcher))
        })
    }

    /// Take one snapshot and queue the events it implies
    fn poll(&mut self) {
        let Some(job) = self.store.get(&self.job_id) else {
            self.finish(ProgressEvent::Error {
                message: format!("Job not found: {}", self.job_id),
                job: None,
            });
            return;
        };

        if !self.started {
            self.started = true;
            self.queue.push_back(ProgressEvent::JobStarted {
                job_id: self.job_id.clone(),
            });
        }

        let running = job.status().running_stage();
        for (index, stage) in STAGES.into_iter().enumerate() {
            if running == Some(stage) {
                if !self.stage_started[index] {
                    self.stage_started[index] = true;
                    self.queue.push_back(ProgressEvent::StageStarted(stage));
                }
                self.report_streams(&job, stage);
            }
            if !self.stage_done[index]
                && let Some(event) = completion_event(&job, stage)
            {
                self.stage_done[index] = true;
                self.queue.push_back(event);
            }
        }

        match job.status() {
            JobStatus::Complete => self.finish(ProgressEvent::Complete(Box::new(job))),
            JobStatus::Error => {
                let message = job.error().unwrap_or("Unknown error").to_string();
                self.finish(ProgressEvent::Error {
                    message,
                    job: Some(Box::new(job)),
                });
            }
            _ => {}
        }
    }

    fn report_streams(&mut self, job: &Job, stage: Stage) {
        let streams = job.progress.streams(stage);
        let unchanged = matches!(
            &self.last_streams,
            Some((last_stage, last)) if *last_stage == stage && last == streams
        );
        if !unchanged {
            self.last_streams = Some((stage, streams.clone()));
            self.queue.push_back(ProgressEvent::StageProgress {
                stage,
                streams: streams.clone(),
            });
        }
    }

    fn finish(&mut self, event: ProgressEvent) {
        self.queue.push_back(event);
        self.finished = true;
    }
}

fn completion_event(job: &Job, stage: Stage) -> Option<ProgressEvent> {
    match stage {
        Stage::Stage1 => job.stage1.clone().map(ProgressEvent::Stage1Complete),
        Stage::Stage2 => job.stage2.clone().map(|results| ProgressEvent::Stage2Complete {
            results,
            metadata: job.metadata.clone().unwrap_or_default(),
        }),
        Stage::Stage3 => job.stage3.clone().map(ProgressEvent::Stage3Complete),
    }
}

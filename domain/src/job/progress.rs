//! Per-worker streaming buffers and external control flags.

use crate::core::worker::WorkerId;
use crate::job::status::Stage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Status of one worker's stream within a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Streaming,
    Complete,
    Failed,
    Skipped,
}

impl StreamStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamStatus::Streaming)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Streaming => "streaming",
            StreamStatus::Complete => "complete",
            StreamStatus::Failed => "failed",
            StreamStatus::Skipped => "skipped",
        }
    }
}

/// Accumulated partial output of one worker in one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStream {
    pub content: String,
    pub char_count: usize,
    pub status: StreamStatus,
}

impl Default for WorkerStream {
    fn default() -> Self {
        Self {
            content: String::new(),
            char_count: 0,
            status: StreamStatus::Streaming,
        }
    }
}

impl WorkerStream {
    /// Append a chunk. Chunks arriving after the stream reached a terminal
    /// status are dropped.
    pub fn push(&mut self, chunk: &str) -> bool {
        if self.status.is_terminal() || chunk.is_empty() {
            return false;
        }
        self.content.push_str(chunk);
        self.char_count += chunk.chars().count();
        true
    }

    /// Move to `status`. Terminal statuses are sticky: a late completion
    /// never overwrites `skipped`, and a skip never overwrites `complete`.
    pub fn set_status(&mut self, status: StreamStatus) -> bool {
        if self.status.is_terminal() || self.status == status {
            return false;
        }
        self.status = status;
        true
    }
}

/// Streams of every worker in one stage, keyed by worker id
pub type StageStreams = BTreeMap<WorkerId, WorkerStream>;

/// Real-time progress of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Number of workers launched in stage 1
    pub models_total: usize,
    /// Stage-1 workers that completed, in completion order
    pub models_responded: Vec<WorkerId>,
    /// Stage-1 workers that failed or were skipped, in completion order
    pub models_failed: Vec<WorkerId>,
    #[serde(default)]
    pub stage1: StageStreams,
    #[serde(default)]
    pub stage2: StageStreams,
    #[serde(default)]
    pub stage3: StageStreams,
}

impl JobProgress {
    pub fn streams(&self, stage: Stage) -> &StageStreams {
        match stage {
            Stage::Stage1 => &self.stage1,
            Stage::Stage2 => &self.stage2,
            Stage::Stage3 => &self.stage3,
        }
    }

    pub fn streams_mut(&mut self, stage: Stage) -> &mut StageStreams {
        match stage {
            Stage::Stage1 => &mut self.stage1,
            Stage::Stage2 => &mut self.stage2,
            Stage::Stage3 => &mut self.stage3,
        }
    }

    /// Number of workers in `stage` whose stream is `complete`
    pub fn completed_count(&self, stage: Stage) -> usize {
        self.streams(stage)
            .values()
            .filter(|s| s.status == StreamStatus::Complete)
            .count()
    }
}

/// Signals set by an external actor while a job runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlags {
    /// Workers whose stage-1 call should be aborted
    pub skipped: BTreeSet<WorkerId>,
    /// Stop waiting for stage-1 stragglers
    pub force_continue: bool,
}

//! Job lifecycle states

use serde::{Deserialize, Serialize};

/// A pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Independent answers from every council worker
    Stage1,
    /// Anonymized peer evaluation of the stage-1 answers
    Stage2,
    /// Chairman synthesis
    Stage3,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Stage1 => "stage1",
            Stage::Stage2 => "stage2",
            Stage::Stage3 => "stage3",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Stage1 => "Stage 1: Answers",
            Stage::Stage2 => "Stage 2: Rankings",
            Stage::Stage3 => "Stage 3: Synthesis",
        }
    }

    /// Status a job carries while this stage runs
    pub fn running_status(&self) -> JobStatus {
        match self {
            Stage::Stage1 => JobStatus::Stage1Running,
            Stage::Stage2 => JobStatus::Stage2Running,
            Stage::Stage3 => JobStatus::Stage3Running,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Stage1Running,
    Stage1Complete,
    Stage2Running,
    Stage2Complete,
    Stage3Running,
    Complete,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Stage1Running => "stage1_running",
            JobStatus::Stage1Complete => "stage1_complete",
            JobStatus::Stage2Running => "stage2_running",
            JobStatus::Stage2Complete => "stage2_complete",
            JobStatus::Stage3Running => "stage3_running",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }

    /// `Complete` and `Error` are terminal; nothing leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    /// The stage currently streaming, if any
    pub fn running_stage(&self) -> Option<Stage> {
        match self {
            JobStatus::Stage1Running => Some(Stage::Stage1),
            JobStatus::Stage2Running => Some(Stage::Stage2),
            JobStatus::Stage3Running => Some(Stage::Stage3),
            _ => None,
        }
    }

    /// Whether the pipeline may move from `self` to `next`.
    ///
    /// `Stage1Complete -> Stage2Complete` is legal: stage 2 is skipped when
    /// there are fewer than two answers to compare.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;

        if self.is_terminal() {
            return false;
        }
        if next == Error {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Stage1Running)
                | (Stage1Running, Stage1Complete)
                | (Stage1Complete, Stage2Running)
                | (Stage1Complete, Stage2Complete)
                | (Stage2Running, Stage2Complete)
                | (Stage2Complete, Stage3Running)
                | (Stage3Running, Complete)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

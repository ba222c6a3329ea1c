//! Debate participants, transcript entries and events

use crate::core::worker::WorkerId;
use crate::debate::decision::ModeratorDecision;
use crate::debate::role::DebateRole;
use serde::{Deserialize, Serialize};

/// A worker seated on the panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: WorkerId,
    /// Name the moderator uses to call on this participant
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<DebateRole>,
}

/// Seat `workers` in order, giving each a unique short name and the role at
/// the same position (if any).
///
/// Duplicate names get a `_N` suffix with the 1-based seat number.
pub fn assign_participants(workers: &[WorkerId], roles: &[DebateRole]) -> Vec<Participant> {
    let mut seated: Vec<Participant> = Vec::with_capacity(workers.len());
    for (i, id) in workers.iter().enumerate() {
        let mut name = id.display_name();
        if seated.iter().any(|p| p.name == name) {
            name = format!("{}_{}", name, i + 1);
        }
        seated.push(Participant {
            id: id.clone(),
            name,
            role: roles.get(i).copied(),
        });
    }
    seated
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    OpeningStatements,
    Discussion,
    Conclusion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Opening,
    Discussion,
}

/// One statement in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateEntry {
    pub speaker: String,
    pub model: WorkerId,
    pub content: String,
    pub kind: TurnKind,
}

/// Events pushed to the observer as the debate unfolds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DebateEvent {
    DebateStart {
        topic: String,
        participants: Vec<Participant>,
        moderator: WorkerId,
        role_based: bool,
    },
    Phase {
        phase: DebatePhase,
    },
    SpeakerStart {
        model: WorkerId,
        name: String,
    },
    SpeakerComplete {
        model: WorkerId,
        name: String,
        content: String,
        turn_type: TurnKind,
    },
    ModeratorDecision {
        decision: ModeratorDecision,
    },
    SummaryStart,
    SummaryComplete {
        moderator: WorkerId,
        summary: String,
    },
    DebateComplete {
        total_turns: usize,
        participants: Vec<String>,
    },
}

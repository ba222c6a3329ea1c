//! Adversarial debate roles

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stance assigned to a debate participant to keep the panel from
/// converging too early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateRole {
    Advocate,
    Skeptic,
    DevilsAdvocate,
    Synthesizer,
    FactChecker,
    Pragmatist,
}

/// Roles handed out by position when the user asks for roles without
/// naming them
pub const DEFAULT_ROLE_ROTATION: [DebateRole; 4] = [
    DebateRole::Advocate,
    DebateRole::Skeptic,
    DebateRole::DevilsAdvocate,
    DebateRole::Synthesizer,
];

impl DebateRole {
    pub const ALL: [DebateRole; 6] = [
        DebateRole::Advocate,
        DebateRole::Skeptic,
        DebateRole::DevilsAdvocate,
        DebateRole::Synthesizer,
        DebateRole::FactChecker,
        DebateRole::Pragmatist,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DebateRole::Advocate => "advocate",
            DebateRole::Skeptic => "skeptic",
            DebateRole::DevilsAdvocate => "devils_advocate",
            DebateRole::Synthesizer => "synthesizer",
            DebateRole::FactChecker => "fact_checker",
            DebateRole::Pragmatist => "pragmatist",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DebateRole::Advocate => "The Advocate",
            DebateRole::Skeptic => "The Skeptic",
            DebateRole::DevilsAdvocate => "Devil's Advocate",
            DebateRole::Synthesizer => "The Synthesizer",
            DebateRole::FactChecker => "The Fact-Checker",
            DebateRole::Pragmatist => "The Pragmatist",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DebateRole::Advocate => {
                "You argue in favor of the proposition. Find the strongest arguments supporting it."
            }
            DebateRole::Skeptic => {
                "You question assumptions and demand evidence. Challenge claims that lack support."
            }
            DebateRole::DevilsAdvocate => {
                "You deliberately argue against the emerging consensus to stress-test ideas."
            }
            DebateRole::Synthesizer => {
                "You find common ground and integrate different perspectives into coherent positions."
            }
            DebateRole::FactChecker => {
                "You focus on factual accuracy. Identify claims that may be incorrect or misleading."
            }
            DebateRole::Pragmatist => {
                "You focus on practical implications and real-world applicability of ideas."
            }
        }
    }

    pub fn style(&self) -> &'static str {
        match self {
            DebateRole::Advocate => "constructive and persuasive",
            DebateRole::Skeptic => "questioning and analytical",
            DebateRole::DevilsAdvocate => "contrarian but constructive",
            DebateRole::Synthesizer => "balanced and integrative",
            DebateRole::FactChecker => "precise and evidence-focused",
            DebateRole::Pragmatist => "practical and grounded",
        }
    }
}

impl fmt::Display for DebateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for DebateRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        DebateRole::ALL
            .into_iter()
            .find(|r| r.key() == normalized)
            .ok_or_else(|| DomainError::UnknownRole(s.to_string()))
    }
}

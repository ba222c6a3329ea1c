//! Live debate domain
//!
//! A panel of workers gives opening statements, then a moderator repeatedly
//! picks who speaks next until it calls the discussion finished or the turn
//! budget runs out, and closes with a summary.

pub mod decision;
pub mod entities;
pub mod prompt;
pub mod role;

pub use decision::ModeratorDecision;
pub use entities::{DebateEntry, DebateEvent, DebatePhase, Participant, TurnKind, assign_participants};
pub use prompt::DebatePrompt;
pub use role::{DEFAULT_ROLE_ROTATION, DebateRole};

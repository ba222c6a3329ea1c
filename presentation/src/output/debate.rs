//! Console rendering of a live debate

use colored::Colorize;
use council_application::DebateTranscript;
use council_domain::{DebateEntry, DebateEvent, DebatePhase, Participant, TurnKind};
use serde::Serialize;

#[derive(Serialize)]
struct DebateReport<'a> {
    topic: &'a str,
    participants: &'a [Participant],
    entries: &'a [DebateEntry],
    summary: &'a str,
}

/// Formats debate events as they arrive, and the finished transcript
pub struct DebateFormatter;

impl DebateFormatter {
    /// Console text for one event. `None` for events that only matter to
    /// the progress display.
    pub fn format_event(event: &DebateEvent) -> Option<String> {
        match event {
            DebateEvent::DebateStart {
                topic,
                participants,
                moderator,
                ..
            } => {
                let mut output = format!(
                    "{} {}\n{} {}\n",
                    "Topic:".cyan().bold(),
                    topic,
                    "Moderator:".cyan().bold(),
                    moderator
                );
                output.push_str(&format!("{}\n", "Panel:".cyan().bold()));
                for participant in participants {
                    output.push_str(&format!("  {}\n", Self::seat(participant)));
                }
                Some(output)
            }
            DebateEvent::Phase { phase } => {
                let title = match phase {
                    DebatePhase::OpeningStatements => "Opening Statements",
                    DebatePhase::Discussion => "Discussion",
                    DebatePhase::Conclusion => "Conclusion",
                };
                Some(format!("\n{}\n{}", title.cyan().bold(), "-".repeat(40)))
            }
            DebateEvent::SpeakerComplete {
                model,
                name,
                content,
                turn_type,
            } => {
                let tag = match turn_type {
                    TurnKind::Opening => "opening",
                    TurnKind::Discussion => "turn",
                };
                Some(format!(
                    "\n{} {}\n{}\n",
                    format!("── {} ──", name).yellow().bold(),
                    format!("({}, {})", model, tag).dimmed(),
                    content
                ))
            }
            DebateEvent::ModeratorDecision { decision } => {
                let line = match (&decision.next_speaker, decision.should_continue) {
                    (_, false) => "Moderator closes the discussion".to_string(),
                    (Some(next), true) => format!("Moderator calls on {}", next),
                    (None, true) => "Moderator continues".to_string(),
                };
                let line = match &decision.reason {
                    Some(reason) => format!("{}: {}", line, reason),
                    None => line,
                };
                Some(format!("{}", line.dimmed()))
            }
            DebateEvent::SummaryComplete { moderator, summary } => Some(format!(
                "\n{}\n\n{}\n",
                format!("Summary by {}", moderator).green().bold(),
                summary
            )),
            DebateEvent::DebateComplete { total_turns, .. } => Some(format!(
                "\n{}\n",
                format!("Debate complete after {} statements", total_turns).dimmed()
            )),
            DebateEvent::SpeakerStart { .. } | DebateEvent::SummaryStart => None,
        }
    }

    /// Format the finished debate as JSON
    pub fn format_json(topic: &str, transcript: &DebateTranscript) -> String {
        let report = DebateReport {
            topic,
            participants: &transcript.participants,
            entries: &transcript.entries,
            summary: &transcript.summary,
        };
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
    }

    fn seat(participant: &Participant) -> String {
        match participant.role {
            Some(role) => format!("{} ({}) - {}", participant.name, participant.id, role.name()),
            None => format!("{} ({})", participant.name, participant.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{DebateRole, ModeratorDecision, WorkerId};

    fn w(s: &str) -> WorkerId {
        s.parse().unwrap()
    }

    #[test]
    fn test_start_lists_panel_with_roles() {
        colored::control::set_override(false);
        let event = DebateEvent::DebateStart {
            topic: "Tabs or spaces?".to_string(),
            participants: vec![Participant {
                id: w("openai/gpt-4o"),
                name: "Gpt".to_string(),
                role: Some(DebateRole::Skeptic),
            }],
            moderator: w("chair"),
            role_based: true,
        };

        let output = DebateFormatter::format_event(&event).unwrap();
        assert!(output.contains("Topic: Tabs or spaces?"));
        assert!(output.contains("Gpt (openai/gpt-4o) - The Skeptic"));
    }

    #[test]
    fn test_moderator_decision_line() {
        colored::control::set_override(false);
        let event = DebateEvent::ModeratorDecision {
            decision: ModeratorDecision {
                should_continue: true,
                next_speaker: Some("Claude".to_string()),
                reason: Some("has not spoken".to_string()),
            },
        };
        assert_eq!(
            DebateFormatter::format_event(&event).unwrap(),
            "Moderator calls on Claude: has not spoken"
        );
        assert!(DebateFormatter::format_event(&DebateEvent::SummaryStart).is_none());
    }

    #[test]
    fn test_transcript_json() {
        let transcript = DebateTranscript {
            participants: Vec::new(),
            entries: vec![DebateEntry {
                speaker: "Gpt".to_string(),
                model: w("openai/gpt-4o"),
                content: "Spaces.".to_string(),
                kind: TurnKind::Opening,
            }],
            summary: "Spaces won.".to_string(),
        };

        let json: serde_json::Value =
            serde_json::from_str(&DebateFormatter::format_json("Tabs?", &transcript)).unwrap();
        assert_eq!(json["topic"], "Tabs?");
        assert_eq!(json["entries"][0]["kind"], "opening");
        assert_eq!(json["summary"], "Spaces won.");
    }
}

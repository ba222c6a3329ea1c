//! Run Debate use case
//!
//! Opening statements from every participant, a moderated discussion of up
//! to `max_turns` turns, then a moderator summary. Progress is pushed to the
//! caller as [`DebateEvent`]s over an mpsc channel.

use crate::ports::worker_gateway::WorkerGateway;
use council_domain::{
    DebateEntry, DebateEvent, DebatePhase, DebatePrompt, DebateRole, Message, ModeratorDecision,
    Participant, TurnKind, WorkerId, assign_participants,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Stand-in statement for a participant whose call failed
pub const UNABLE_TO_RESPOND: &str = "Unable to respond.";
/// Stand-in summary when the moderator's summary call failed
pub const UNABLE_TO_SUMMARIZE: &str = "Unable to generate summary.";

pub const DEFAULT_MAX_TURNS: usize = 12;

/// Input for the debate use case
#[derive(Debug, Clone)]
pub struct DebateInput {
    pub topic: String,
    pub participants: Vec<WorkerId>,
    pub moderator: WorkerId,
    /// Discussion turns after the opening statements
    pub max_turns: usize,
    /// Roles by seat position; seats past the end get none
    pub roles: Vec<DebateRole>,
}

impl DebateInput {
    pub fn new(topic: impl Into<String>, participants: Vec<WorkerId>, moderator: WorkerId) -> Self {
        Self {
            topic: topic.into(),
            participants,
            moderator,
            max_turns: DEFAULT_MAX_TURNS,
            roles: Vec::new(),
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_roles(mut self, roles: Vec<DebateRole>) -> Self {
        self.roles = roles;
        self
    }
}

/// Finished debate
#[derive(Debug, Clone, PartialEq)]
pub struct DebateTranscript {
    pub participants: Vec<Participant>,
    pub entries: Vec<DebateEntry>,
    pub summary: String,
}

pub struct RunDebateUseCase<G: WorkerGateway + 'static> {
    gateway: Arc<G>,
}

impl<G: WorkerGateway + 'static> RunDebateUseCase<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub async fn execute(
        &self,
        input: DebateInput,
        events: mpsc::Sender<DebateEvent>,
    ) -> DebateTranscript {
        let emit = |event: DebateEvent| {
            let events = events.clone();
            async move {
                // A dropped receiver only means nobody is watching
                let _ = events.send(event).await;
            }
        };

        let topic = input.topic.as_str();
        let participants = assign_participants(&input.participants, &input.roles);
        let names: Vec<String> = participants.iter().map(|p| p.name.clone()).collect();
        let mut history: Vec<DebateEntry> = Vec::new();

        info!(
            participants = participants.len(),
            moderator = %input.moderator,
            max_turns = input.max_turns,
            "Starting debate"
        );

        emit(DebateEvent::DebateStart {
            topic: input.topic.clone(),
            participants: participants.clone(),
            moderator: input.moderator.clone(),
            role_based: !input.roles.is_empty(),
        })
        .await;

        // Opening statements
        emit(DebateEvent::Phase {
            phase: DebatePhase::OpeningStatements,
        })
        .await;
        for participant in &participants {
            let prompt = DebatePrompt::opening(topic, participant);
            let entry = self.speak(participant, prompt, TurnKind::Opening, &emit).await;
            history.push(entry);
        }

        // Moderated discussion
        emit(DebateEvent::Phase {
            phase: DebatePhase::Discussion,
        })
        .await;
        let mut turn = 0;
        while turn < input.max_turns && !participants.is_empty() {
            let moderator_prompt = DebatePrompt::moderator(topic, &history, &participants);
            let reply = self
                .ask(&input.moderator, moderator_prompt)
                .await
                .unwrap_or_default();
            let decision = ModeratorDecision::parse_or_round_robin(&reply, &names, turn);
            debug!(
                turn,
                should_continue = decision.should_continue,
                next_speaker = ?decision.next_speaker,
                "Moderator decision"
            );

            emit(DebateEvent::ModeratorDecision {
                decision: decision.clone(),
            })
            .await;

            if !decision.should_continue {
                info!(turn, "Moderator ended the discussion");
                break;
            }

            let speaker = resolve_speaker(&participants, decision.next_speaker.as_deref(), turn);
            let prompt = DebatePrompt::speaker(topic, &history, speaker);
            let entry = self.speak(speaker, prompt, TurnKind::Discussion, &emit).await;
            history.push(entry);

            turn += 1;
        }

        // Conclusion
        emit(DebateEvent::Phase {
            phase: DebatePhase::Conclusion,
        })
        .await;
        emit(DebateEvent::SummaryStart).await;

        let summary = self
            .ask(&input.moderator, DebatePrompt::summary(topic, &history))
            .await
            .unwrap_or_else(|| UNABLE_TO_SUMMARIZE.to_string());

        emit(DebateEvent::SummaryComplete {
            moderator: input.moderator.clone(),
            summary: summary.clone(),
        })
        .await;
        emit(DebateEvent::DebateComplete {
            total_turns: history.len(),
            participants: names,
        })
        .await;

        info!(total_turns = history.len(), "Debate complete");

        DebateTranscript {
            participants,
            entries: history,
            summary,
        }
    }

    async fn speak<F, Fut>(
        &self,
        participant: &Participant,
        prompt: String,
        kind: TurnKind,
        emit: &F,
    ) -> DebateEntry
    where
        F: Fn(DebateEvent) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        emit(DebateEvent::SpeakerStart {
            model: participant.id.clone(),
            name: participant.name.clone(),
        })
        .await;

        let content = self
            .ask(&participant.id, prompt)
            .await
            .unwrap_or_else(|| UNABLE_TO_RESPOND.to_string());

        emit(DebateEvent::SpeakerComplete {
            model: participant.id.clone(),
            name: participant.name.clone(),
            content: content.clone(),
            turn_type: kind,
        })
        .await;

        DebateEntry {
            speaker: participant.name.clone(),
            model: participant.id.clone(),
            content,
            kind,
        }
    }

    async fn ask(&self, worker: &WorkerId, prompt: String) -> Option<String> {
        match self.gateway.call(worker, &[Message::user(prompt)]).await {
            Ok(content) => Some(content),
            Err(e) => {
                warn!(worker = %worker, error = %e, "Debate call failed");
                None
            }
        }
    }
}

/// Participant named by the moderator (case-insensitive), else the one at
/// `turn` in seat order
fn resolve_speaker<'a>(
    participants: &'a [Participant],
    requested: Option<&str>,
    turn: usize,
) -> &'a Participant {
    requested
        .and_then(|name| {
            participants
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
        })
        .unwrap_or(&participants[turn % participants.len()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::worker_gateway::FailureReason;
    use crate::test_support::{Script, ScriptedGateway, w};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn is_moderator_prompt(prompt: &str) -> bool {
        prompt.starts_with("You are moderating")
    }

    fn is_summary_prompt(prompt: &str) -> bool {
        prompt.starts_with("You moderated")
    }

    async fn run(
        gateway: ScriptedGateway,
        input: DebateInput,
    ) -> (DebateTranscript, Vec<DebateEvent>, Arc<ScriptedGateway>) {
        let gateway = Arc::new(gateway);
        let (tx, mut rx) = mpsc::channel(256);
        let transcript = RunDebateUseCase::new(gateway.clone())
            .execute(input, tx)
            .await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (transcript, events, gateway)
    }

    #[tokio::test]
    async fn test_moderator_picks_speaker_then_stops() {
        let moderator_turns = Arc::new(AtomicUsize::new(0));
        let counter = moderator_turns.clone();
        let gateway = ScriptedGateway::new(move |worker, prompt| {
            if is_moderator_prompt(prompt) {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Script::text(r#"Sure. {"continue": true, "next_speaker": "claude", "reason": "quiet so far"}"#)
                } else {
                    Script::text(r#"{"continue": false, "next_speaker": null}"#)
                }
            } else if is_summary_prompt(prompt) {
                Script::text("All agreed.")
            } else {
                Script::text(&format!("{} speaks", worker))
            }
        });
        let input = DebateInput::new(
            "Tabs or spaces?",
            vec![w("openai/gpt-4o"), w("anthropic/claude-3")],
            w("chair"),
        );

        let (transcript, events, _) = run(gateway, input).await;

        assert_eq!(transcript.entries.len(), 3);
        assert_eq!(transcript.entries[2].model, w("anthropic/claude-3"));
        assert_eq!(transcript.entries[2].kind, TurnKind::Discussion);
        assert_eq!(transcript.summary, "All agreed.");

        assert!(matches!(events.first(), Some(DebateEvent::DebateStart { role_based: false, .. })));
        assert_eq!(
            events.last(),
            Some(&DebateEvent::DebateComplete {
                total_turns: 3,
                participants: transcript.participants.iter().map(|p| p.name.clone()).collect(),
            })
        );
        let decisions = events
            .iter()
            .filter(|e| matches!(e, DebateEvent::ModeratorDecision { .. }))
            .count();
        assert_eq!(decisions, 2);
    }

    #[tokio::test]
    async fn test_unparsable_moderator_falls_back_to_round_robin() {
        let gateway = ScriptedGateway::new(|worker, prompt| {
            if is_moderator_prompt(prompt) {
                Script::text("no idea")
            } else {
                Script::text(worker.as_str())
            }
        });
        let input = DebateInput::new("Topic", vec![w("x/alpha"), w("y/beta")], w("chair"))
            .with_max_turns(3);

        let (transcript, _, _) = run(gateway, input).await;

        let discussion: Vec<&str> = transcript
            .entries
            .iter()
            .filter(|e| e.kind == TurnKind::Discussion)
            .map(|e| e.model.as_str())
            .collect();
        assert_eq!(discussion, vec!["x/alpha", "y/beta", "x/alpha"]);
    }

    #[tokio::test]
    async fn test_failures_use_placeholders() {
        let gateway = ScriptedGateway::new(|worker, prompt| {
            if is_moderator_prompt(prompt) {
                Script::text(r#"{"continue": false}"#)
            } else if worker.as_str() == "x/alpha" || is_summary_prompt(prompt) {
                Script::Fail(FailureReason::Unreachable)
            } else {
                Script::text("fine")
            }
        });
        let input = DebateInput::new("Topic", vec![w("x/alpha"), w("y/beta")], w("chair"));

        let (transcript, _, _) = run(gateway, input).await;

        assert_eq!(transcript.entries[0].content, UNABLE_TO_RESPOND);
        assert_eq!(transcript.entries[1].content, "fine");
        assert_eq!(transcript.summary, UNABLE_TO_SUMMARIZE);
    }

    #[tokio::test]
    async fn test_zero_turns_skips_moderator() {
        let gateway = ScriptedGateway::new(|_, _| Script::text("ok"));
        let input = DebateInput::new("Topic", vec![w("x/alpha")], w("chair"))
            .with_max_turns(0)
            .with_roles(vec![DebateRole::Skeptic]);

        let (transcript, events, gateway) = run(gateway, input).await;

        assert_eq!(transcript.participants[0].role, Some(DebateRole::Skeptic));
        assert!(matches!(events.first(), Some(DebateEvent::DebateStart { role_based: true, .. })));
        // opening + summary
        assert_eq!(gateway.call_count(), 2);
        assert!(gateway.calls().iter().all(|(_, p)| !is_moderator_prompt(p)));
    }
}

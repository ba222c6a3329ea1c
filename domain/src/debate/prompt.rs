//! Debate prompts

use crate::debate::entities::{DebateEntry, Participant};

pub struct DebatePrompt;

impl DebatePrompt {
    pub fn opening(topic: &str, participant: &Participant) -> String {
        let role_instruction = match participant.role {
            Some(role) => format!(
                "\n\nYOUR ASSIGNED ROLE: {}\nRole Description: {}\nYour debating style should be: {}\n\nIMPORTANT: Stay true to your assigned role throughout the debate. Your role is designed to ensure rigorous examination of the topic from multiple angles.",
                role.name(),
                role.description(),
                role.style()
            ),
            None => String::new(),
        };

        format!(
            r#"You are participating in a panel discussion on the following topic:

TOPIC: {topic}
{role_instruction}

You are {name}. Give your opening perspective on this topic in 2-3 paragraphs.
Be thoughtful and present your view consistent with your role. Share your unique perspective.
Speak naturally as if in a live discussion."#,
            topic = topic,
            role_instruction = role_instruction,
            name = participant.name,
        )
    }

    pub fn moderator(topic: &str, history: &[DebateEntry], participants: &[Participant]) -> String {
        let names = participants
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"You are moderating a panel discussion on: {topic}

Here is the discussion so far:
{history}

Participants available to speak: {names}

As moderator, decide:
1. Should the discussion continue, or has it reached a natural conclusion?
2. If continuing, who should speak next? Pick someone who likely has something valuable to add - perhaps they were referenced, have expertise to contribute, or might offer a different angle.

Respond in this exact JSON format:
{{"continue": true/false, "next_speaker": "speaker_name or null", "reason": "brief reason for your choice"}}

If the discussion has covered the topic well, key points have been made, and continuing would be repetitive, set continue to false."#,
            topic = topic,
            history = Self::transcript(history),
            names = names,
        )
    }

    pub fn speaker(topic: &str, history: &[DebateEntry], participant: &Participant) -> String {
        let role_instruction = match participant.role {
            Some(role) => format!(
                "\n\nRemember your role: {} - {}\nYour style: {}\nStay true to your role while engaging with others.",
                role.name(),
                role.description(),
                role.style()
            ),
            None => String::new(),
        };

        format!(
            r#"You are {name} in a panel discussion on: {topic}

Here is the discussion so far:
{history}{role_instruction}

The moderator has called on you to speak. Respond to what's been said - you can:
- Build on someone's point
- Offer a different perspective
- Ask a clarifying question to another participant
- Synthesize ideas from multiple speakers
- Challenge assumptions if that fits your role

Be conversational and natural. Speak in 1-3 paragraphs. Don't repeat what's already been said.
If you agree with someone, say so briefly and add something new. Have your own voice."#,
            name = participant.name,
            topic = topic,
            history = Self::transcript(history),
            role_instruction = role_instruction,
        )
    }

    pub fn summary(topic: &str, history: &[DebateEntry]) -> String {
        format!(
            r#"You moderated a panel discussion on: {topic}

Here is the full discussion:
{history}

Provide a thoughtful summary that:
1. Captures the key points and perspectives shared
2. Notes areas of agreement and disagreement
3. Highlights any particularly insightful contributions
4. Offers a balanced conclusion or synthesis

Be fair to all participants and their viewpoints."#,
            topic = topic,
            history = Self::transcript(history),
        )
    }

    fn transcript(history: &[DebateEntry]) -> String {
        history
            .iter()
            .map(|h| format!("**{}**: {}", h.speaker, h.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::entities::TurnKind;
    use crate::debate::role::DebateRole;

    fn participant(role: Option<DebateRole>) -> Participant {
        Participant {
            id: "openai/gpt-4o".parse().unwrap(),
            name: "Gpt".to_string(),
            role,
        }
    }

    #[test]
    fn test_opening_includes_role() {
        let prompt = DebatePrompt::opening("Tabs vs spaces", &participant(Some(DebateRole::Skeptic)));
        assert!(prompt.contains("TOPIC: Tabs vs spaces"));
        assert!(prompt.contains("YOUR ASSIGNED ROLE: The Skeptic"));
        assert!(prompt.contains("You are Gpt."));

        let plain = DebatePrompt::opening("Tabs vs spaces", &participant(None));
        assert!(!plain.contains("ASSIGNED ROLE"));
    }

    #[test]
    fn test_moderator_lists_history_and_names() {
        let history = vec![DebateEntry {
            speaker: "Gpt".to_string(),
            model: "openai/gpt-4o".parse().unwrap(),
            content: "Spaces.".to_string(),
            kind: TurnKind::Opening,
        }];
        let prompt = DebatePrompt::moderator("Tabs", &history, &[participant(None)]);
        assert!(prompt.contains("**Gpt**: Spaces."));
        assert!(prompt.contains("Participants available to speak: Gpt"));
        assert!(prompt.contains(r#"{"continue": true/false"#));
    }
}

//! Moderator turn decisions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use regex::Regex;

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]+\}").expect("valid regex"));

/// What the moderator wants to happen next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeratorDecision {
    #[serde(rename = "continue")]
    pub should_continue: bool,
    pub next_speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ModeratorDecision {
    /// Extract the first flat JSON object from the moderator's reply.
    ///
    /// A missing `continue` key means continue. Returns `None` when no
    /// object is present or it is not valid JSON.
    pub fn parse(text: &str) -> Option<Self> {
        let raw = JSON_OBJECT.find(text)?;
        let value: Value = serde_json::from_str(raw.as_str()).ok()?;
        let obj = value.as_object()?;

        let should_continue = obj.get("continue").and_then(Value::as_bool).unwrap_or(true);
        let next_speaker = match obj.get("next_speaker") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };
        let reason = obj
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self {
            should_continue,
            next_speaker,
            reason,
        })
    }

    /// Continue with the speaker at `turn` in rotation
    pub fn round_robin(names: &[String], turn: usize) -> Self {
        let next_speaker = if names.is_empty() {
            None
        } else {
            Some(names[turn % names.len()].clone())
        };
        Self {
            should_continue: true,
            next_speaker,
            reason: None,
        }
    }

    /// [`parse`](Self::parse), falling back to round-robin
    pub fn parse_or_round_robin(text: &str, names: &[String], turn: usize) -> Self {
        Self::parse(text).unwrap_or_else(|| Self::round_robin(names, turn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["Gpt".to_string(), "Claude".to_string()]
    }

    #[test]
    fn test_parse_embedded_json() {
        let text = r#"Sure. {"continue": true, "next_speaker": "Claude", "reason": "was referenced"} Thanks"#;
        let d = ModeratorDecision::parse(text).unwrap();
        assert!(d.should_continue);
        assert_eq!(d.next_speaker.as_deref(), Some("Claude"));
        assert_eq!(d.reason.as_deref(), Some("was referenced"));
    }

    #[test]
    fn test_parse_stop() {
        let d = ModeratorDecision::parse(r#"{"continue": false, "next_speaker": null}"#).unwrap();
        assert!(!d.should_continue);
        assert!(d.next_speaker.is_none());
    }

    #[test]
    fn test_missing_continue_defaults_true() {
        let d = ModeratorDecision::parse(r#"{"next_speaker": "Gpt"}"#).unwrap();
        assert!(d.should_continue);
    }

    #[test]
    fn test_unparsable_falls_back_to_round_robin() {
        let d = ModeratorDecision::parse_or_round_robin("let Gpt talk", &names(), 3);
        assert!(d.should_continue);
        assert_eq!(d.next_speaker.as_deref(), Some("Claude"));

        let d = ModeratorDecision::parse_or_round_robin("{not json}", &names(), 0);
        assert_eq!(d.next_speaker.as_deref(), Some("Gpt"));
    }

    #[test]
    fn test_serializes_continue_key() {
        let json = serde_json::to_value(ModeratorDecision::round_robin(&names(), 0)).unwrap();
        assert_eq!(json["continue"], true);
        assert_eq!(json["next_speaker"], "Gpt");
    }
}

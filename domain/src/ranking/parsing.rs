//! Ranking text parsing.
//!
//! Extracts a rater's ordering of anonymous labels from free-form
//! evaluation text. Pure domain logic: no I/O, never fails: malformed
//! text yields an empty list.

use std::sync::LazyLock;

use regex::Regex;

/// Marker that introduces the ranked list
pub const FINAL_RANKING_MARKER: &str = "FINAL RANKING:";

static NUMBERED_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\s*(Response [A-Z])").expect("valid regex"));

static LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Response [A-Z]").expect("valid regex"));

/// Parse the ranked label order from an evaluation.
///
/// 1. Between the first `FINAL RANKING:` and the next one (or the end of
///    the text), take numbered entries (`1. Response C`) in the order they
///    appear; the stated numbers are ignored.
/// 2. If that section has no numbered entries, take any label it mentions.
/// 3. Without the marker, or if the section mentions nothing, scan the
///    whole text.
///
/// Repeated labels are kept; each occurrence counts as a position.
///
/// # Examples
///
/// ```
/// use council_domain::ranking::parse_ranking_from_text;
///
/// let text = "...blah...\nFINAL RANKING:\n1. Response B\n2. Response A\n";
/// assert_eq!(parse_ranking_from_text(text), vec!["Response B", "Response A"]);
///
/// let text = "I prefer Response A to Response B";
/// assert_eq!(parse_ranking_from_text(text), vec!["Response A", "Response B"]);
/// ```
pub fn parse_ranking_from_text(text: &str) -> Vec<String> {
    if let Some(section) = text.split(FINAL_RANKING_MARKER).nth(1) {
        let numbered: Vec<String> = NUMBERED_LABEL
            .captures_iter(section)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        if !numbered.is_empty() {
            return numbered;
        }

        let mentioned = labels_in(section);
        if !mentioned.is_empty() {
            return mentioned;
        }
    }

    labels_in(text)
}

fn labels_in(text: &str) -> Vec<String> {
    LABEL
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_list_after_marker() {
        let text = "...blah...\nFINAL RANKING:\n1. Response B\n2. Response A\n";
        assert_eq!(parse_ranking_from_text(text), vec!["Response B", "Response A"]);
    }

    #[test]
    fn test_order_ignores_stated_numbers() {
        let text = "FINAL RANKING:\n3. Response C\n1. Response A\n2. Response B";
        assert_eq!(
            parse_ranking_from_text(text),
            vec!["Response C", "Response A", "Response B"]
        );
    }

    #[test]
    fn test_numbered_without_space() {
        let text = "FINAL RANKING:\n1.Response B\n2.Response A";
        assert_eq!(parse_ranking_from_text(text), vec!["Response B", "Response A"]);
    }

    #[test]
    fn test_text_before_marker_is_ignored() {
        let text = "Response A is weak, Response C is great.\n\nFINAL RANKING:\n1. Response C\n2. Response B\n3. Response A";
        assert_eq!(
            parse_ranking_from_text(text),
            vec!["Response C", "Response B", "Response A"]
        );
    }

    #[test]
    fn test_section_ends_at_next_marker() {
        let text = "FINAL RANKING:\n1. Response A\nFINAL RANKING:\n1. Response B";
        assert_eq!(parse_ranking_from_text(text), vec!["Response A"]);
    }

    #[test]
    fn test_repeated_numbered_entries_are_kept() {
        let text = "FINAL RANKING:\n1. Response A\n2. Response A\n3. Response B";
        assert_eq!(
            parse_ranking_from_text(text),
            vec!["Response A", "Response A", "Response B"]
        );
    }

    #[test]
    fn test_unnumbered_section_falls_back_to_mentions() {
        let text = "FINAL RANKING:\nResponse B, then Response A";
        assert_eq!(parse_ranking_from_text(text), vec!["Response B", "Response A"]);
    }

    #[test]
    fn test_no_marker_scans_whole_text() {
        let text = "I prefer Response A to Response B";
        assert_eq!(parse_ranking_from_text(text), vec!["Response A", "Response B"]);
    }

    #[test]
    fn test_empty_marker_section_scans_whole_text() {
        let text = "Response B beats Response A.\nFINAL RANKING:\n(none)";
        assert_eq!(parse_ranking_from_text(text), vec!["Response B", "Response A"]);
    }

    #[test]
    fn test_repeated_mentions_are_kept() {
        let text = "Response A is good. Response B is better than Response A.";
        assert_eq!(
            parse_ranking_from_text(text),
            vec!["Response A", "Response B", "Response A"]
        );
    }

    #[test]
    fn test_garbage_yields_empty() {
        assert!(parse_ranking_from_text("").is_empty());
        assert!(parse_ranking_from_text("no labels here. response a?").is_empty());
    }
}

//! Heuristic progress estimation from unstructured compiler output
//!
//! The compiler has no machine-readable progress channel. Percentages here
//! are a display aid and may go backwards between lines.

/// Message used when a line has no displayable content
pub const PLACEHOLDER_MESSAGE: &str = "Processing...";

/// Longest message handed to a display, in characters
pub const MAX_MESSAGE_CHARS: usize = 100;

const ELLIPSIS: &str = "...";

/// Keyword groups checked in priority order; first hit wins
const STAGE_KEYWORDS: &[(&[&str], u8)] = &[
    (&["loading", "parsing"], 10),
    (&["optimizing", "optimization"], 40),
    (&["compiling"], 60),
    (&["writing", "saving"], 90),
    (&["complete", "success"], 100),
];

/// Estimate completion percentage for a sanitized output line.
///
/// `lines_seen` is the number of lines read so far, including this one.
pub fn estimate(line: &str, lines_seen: usize) -> Option<u8> {
    let lower = line.to_lowercase();

    for (keywords, percentage) in STAGE_KEYWORDS {
        if keywords.iter().any(|keyword| lower.contains(keyword)) {
            return Some(*percentage);
        }
    }

    Some(match lines_seen {
        0..=5 => 15,
        6..=10 => 30,
        11..=20 => 50,
        21..=40 => 70,
        _ => 85,
    })
}

/// Trim a line into a bounded, non-empty progress message
pub fn display_message(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return PLACEHOLDER_MESSAGE.to_string();
    }

    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        let keep = MAX_MESSAGE_CHARS - ELLIPSIS.len();
        let mut message: String = trimmed.chars().take(keep).collect();
        message.push_str(ELLIPSIS);
        return message;
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_stage_keywords() {
        assert_eq!(estimate("Loading weights", 99), Some(10));
        assert_eq!(estimate("Parsing graph", 1), Some(10));
        assert_eq!(estimate("Running optimization pass", 1), Some(40));
        assert_eq!(estimate("Compiling subgraph 3", 1), Some(60));
        assert_eq!(estimate("Saving artifact", 1), Some(90));
        assert_eq!(estimate("Success!", 1), Some(100));
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(estimate("LOADING", 50), estimate("loading", 50));
        assert_eq!(estimate("COMPILING", 3), Some(60));
    }

    #[test]
    fn test_priority_order_when_several_keywords_match() {
        // "loading" outranks "complete"
        assert_eq!(estimate("loading complete", 7), Some(10));
        // "writing" outranks "success"
        assert_eq!(estimate("writing success marker", 7), Some(90));
    }

    #[test]
    fn test_line_count_fallback() {
        assert_eq!(estimate("layer 1", 1), Some(15));
        assert_eq!(estimate("layer 1", 5), Some(15));
        assert_eq!(estimate("layer 1", 6), Some(30));
        assert_eq!(estimate("layer 1", 10), Some(30));
        assert_eq!(estimate("layer 1", 20), Some(50));
        assert_eq!(estimate("layer 1", 40), Some(70));
        assert_eq!(estimate("layer 1", 41), Some(85));
    }

    #[test]
    fn test_display_message_bounds() {
        assert_eq!(display_message(""), PLACEHOLDER_MESSAGE);
        assert_eq!(display_message("   \t\n"), PLACEHOLDER_MESSAGE);
        assert_eq!(display_message("  Compiling  \n"), "Compiling");

        let long = display_message(&"x".repeat(200));
        assert_eq!(long.chars().count(), 100);
        assert!(long.ends_with("..."));

        let exact = display_message(&"x".repeat(100));
        assert_eq!(exact.chars().count(), 100);
        assert!(!exact.ends_with("..."));
    }

    #[test]
    fn test_display_message_counts_characters_not_bytes() {
        let long = display_message(&"가".repeat(150));
        assert_eq!(long.chars().count(), 100);
        assert!(long.starts_with("가가가"));
    }

    proptest! {
        #[test]
        fn prop_estimate_is_within_range(line in ".*", n in 0usize..10_000) {
            let pct = estimate(&line, n).unwrap();
            prop_assert!(pct <= 100);
        }

        #[test]
        fn prop_display_message_is_bounded(line in ".*") {
            let message = display_message(&line);
            prop_assert!(!message.is_empty());
            prop_assert!(message.chars().count() <= MAX_MESSAGE_CHARS);
        }
    }
}

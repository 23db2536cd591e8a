//! Terminal control code removal for captured compiler output

use once_cell::sync::Lazy;
use regex::Regex;

/// CSI sequences (`ESC [ params intermediates final`) and bare two-byte escapes
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("ANSI escape pattern is valid")
});

/// Strip ANSI/VT100 escape sequences from a line of output.
///
/// Removal is repeated until nothing matches, so an escape that only forms
/// after an inner one is cut out (`ESC ESC[31m [0m`) is removed as well and
/// the result is a fixed point.
pub fn sanitize(raw: &str) -> String {
    let mut current = ANSI_ESCAPE.replace_all(raw, "").into_owned();
    while ANSI_ESCAPE.is_match(&current) {
        current = ANSI_ESCAPE.replace_all(&current, "").into_owned();
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_color_codes() {
        assert_eq!(sanitize("\x1B[31mError\x1B[0m: bad"), "Error: bad");
        assert_eq!(sanitize("\x1B[1;32mOK\x1B[m"), "OK");
    }

    #[test]
    fn test_strips_cursor_movement_and_bare_escapes() {
        assert_eq!(sanitize("\x1B[2K\x1B[1Gprogress 50%"), "progress 50%");
        assert_eq!(sanitize("\x1B[?25lhidden cursor\x1B[?25h"), "hidden cursor");
        assert_eq!(sanitize("a\x1BMb\x1BDc"), "abc");
    }

    #[test]
    fn test_keeps_multibyte_text() {
        assert_eq!(sanitize("\x1B[33m모델 로딩 ✓\x1B[0m"), "모델 로딩 ✓");
        assert_eq!(sanitize("naïve — ok"), "naïve — ok");
    }

    #[test]
    fn test_nested_escape_is_fully_removed() {
        let raw = "\x1B\x1B[31m[0mtext";
        assert_eq!(sanitize(raw), "text");
    }

    #[test]
    fn test_lone_escape_byte_survives() {
        // An ESC not followed by a valid introducer is not a sequence.
        assert_eq!(sanitize("a\x1B"), "a\x1B");
    }

    proptest! {
        #[test]
        fn prop_clean_text_is_unchanged(s in "[^\x1B]*") {
            prop_assert_eq!(sanitize(&s), s);
        }

        #[test]
        fn prop_sanitize_is_idempotent(s in any::<String>()) {
            let once = sanitize(&s);
            prop_assert_eq!(sanitize(&once), once.clone());
        }

        #[test]
        fn prop_idempotent_on_escape_heavy_input(s in "(\x1B|\\[|[0-9;]|m|[a-z ])*") {
            let once = sanitize(&s);
            prop_assert_eq!(sanitize(&once), once.clone());
        }
    }
}

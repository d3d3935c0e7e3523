//! Pure payload validation and text sanitization. No state, no I/O.

use crate::errors::RelayError;

/// Maximum accepted message length, in characters.
pub const MAX_MESSAGE_LEN: usize = 500;

const TRUNCATION_MARKER: &str = "...";

/// Check a decoded `message` payload. Runs before sanitization; rejects
/// rather than degrades.
pub fn validate_message(
    to: Option<&str>,
    text: Option<&str>,
) -> Result<(String, String), RelayError> {
    let text = match text {
        Some(t) if !t.is_empty() => t,
        _ => return Err(RelayError::MissingText),
    };
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(RelayError::OversizedText);
    }
    let to = match to {
        Some(t) if !t.is_empty() => t,
        _ => return Err(RelayError::MissingRecipient),
    };
    Ok((to.to_owned(), text.to_owned()))
}

/// Clean message text for delivery: trim surrounding whitespace, escape the
/// two markup-significant characters, and cap the length. Total — degrades
/// rather than rejects. Idempotent for inputs within the length bound.
pub fn sanitize(text: &str) -> String {
    let escaped = text.trim().replace('<', "&lt;").replace('>', "&gt;");
    if escaped.chars().count() > MAX_MESSAGE_LEN {
        let truncated: String = escaped.chars().take(MAX_MESSAGE_LEN).collect();
        format!("{truncated}{TRUNCATION_MARKER}")
    } else {
        escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_well_formed() {
        let (to, text) = validate_message(Some("bob"), Some("hi")).unwrap();
        assert_eq!(to, "bob");
        assert_eq!(text, "hi");
    }

    #[test]
    fn validate_rejects_missing_or_empty_text() {
        assert_eq!(
            validate_message(Some("bob"), None),
            Err(RelayError::MissingText)
        );
        assert_eq!(
            validate_message(Some("bob"), Some("")),
            Err(RelayError::MissingText)
        );
    }

    #[test]
    fn validate_rejects_oversized_text() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert_eq!(
            validate_message(Some("bob"), Some(&long)),
            Err(RelayError::OversizedText)
        );
        // Exactly at the bound is fine.
        let max = "x".repeat(MAX_MESSAGE_LEN);
        assert!(validate_message(Some("bob"), Some(&max)).is_ok());
    }

    #[test]
    fn validate_rejects_missing_recipient() {
        assert_eq!(
            validate_message(None, Some("hi")),
            Err(RelayError::MissingRecipient)
        );
        assert_eq!(
            validate_message(Some(""), Some("hi")),
            Err(RelayError::MissingRecipient)
        );
    }

    #[test]
    fn text_is_checked_before_recipient() {
        assert_eq!(validate_message(None, None), Err(RelayError::MissingText));
    }

    #[test]
    fn sanitize_trims_whitespace() {
        assert_eq!(sanitize("  hi there \n"), "hi there");
    }

    #[test]
    fn sanitize_escapes_markup() {
        assert_eq!(sanitize("<script>hi"), "&lt;script&gt;hi");
        assert_eq!(sanitize("a < b > c"), "a &lt; b &gt; c");
    }

    #[test]
    fn sanitize_truncates_with_marker() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 50);
        let out = sanitize(&long);
        assert_eq!(out.chars().count(), MAX_MESSAGE_LEN + TRUNCATION_MARKER.len());
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn sanitize_truncates_escape_expansion() {
        // 200 '<' pass validation at 200 chars but escape to 800.
        let input = "<".repeat(200);
        let out = sanitize(&input);
        assert_eq!(out.chars().count(), MAX_MESSAGE_LEN + TRUNCATION_MARKER.len());
        assert!(out.starts_with("&lt;"));
    }

    #[test]
    fn sanitize_never_emits_raw_markup() {
        let out = sanitize("<<>>");
        assert!(!out.contains('<'));
        assert!(!out.contains('>'));
    }

    #[test]
    fn sanitize_is_idempotent_within_bound() {
        for input in ["hi", "  spaced  ", "<script>alert(1)</script>", "a > b", ""] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {input:?}");
        }
        // Property holds for anything whose escaped form fits the bound.
        let near = "<".repeat(100);
        let once = sanitize(&near);
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn sanitize_of_empty_is_empty() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   "), "");
    }
}

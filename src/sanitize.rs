//! Text sanitization for database storage.
//!
//! The destination text columns cannot represent the NUL character
//! (`\u{0}`), but the source platform allows it in user-generated text.
//! Stripping is lossy: the original byte sequence is not recoverable.
//! NUL shows up roughly once per billion records in practice, so the
//! loss is accepted rather than escaped.

/// Remove every NUL character from a text field.
///
/// Applied to every free-text field before it reaches storage (names,
/// descriptions, post text, tags, source labels). Never applied to
/// identifiers.
#[must_use]
pub fn sanitize(text: &str) -> String {
    text.replace('\u{0}', "")
}

/// Optional-field variant: passes `None` through unchanged.
#[must_use]
pub fn sanitize_opt(text: Option<&str>) -> Option<String> {
    text.map(sanitize)
}

#[cfg(test)]
mod tests {
    use super::{sanitize, sanitize_opt};

    #[test]
    fn removes_every_nul_and_nothing_else() {
        assert_eq!(sanitize("\u{0}"), "");
        assert_eq!(sanitize("hello\u{0} world"), "hello world");
        assert_eq!(sanitize("\u{0}a\u{0}b\u{0}"), "ab");
        assert_eq!(sanitize("untouched \t\n text"), "untouched \t\n text");
    }

    #[test]
    fn none_passes_through() {
        assert_eq!(sanitize_opt(None), None);
        assert_eq!(sanitize_opt(Some("a\u{0}b")), Some("ab".to_string()));
    }
}

//! UTF-8-safe truncation (§8 law: for all strings `s` and max-length `M`,
//! the result is valid UTF-8 and its rune count is `<= M + 3`).

/// Truncate `s` to at most `max_chars` Unicode scalar values, appending an
/// ellipsis if truncation occurred. Never splits a multi-byte character.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_string_is_unchanged() {
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn long_string_is_truncated_with_ellipsis() {
        let s = "a".repeat(20);
        let out = truncate_chars(&s, 5);
        assert_eq!(out, "aaaaa...");
        assert_eq!(out.chars().count(), 8);
    }

    #[test]
    fn truncation_never_splits_multibyte_chars() {
        let s = "héllo wörld"; // multi-byte chars throughout
        for n in 0..s.chars().count() + 2 {
            let out = truncate_chars(s, n);
            assert!(std::str::from_utf8(out.as_bytes()).is_ok());
            assert!(out.chars().count() <= n + 3);
        }
    }

    #[test]
    fn exact_length_is_not_truncated() {
        let s = "abcde";
        assert_eq!(truncate_chars(s, 5), "abcde");
    }
}

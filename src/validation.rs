//! Input shape rules applied before any store access.
//!
//! Failures here are reported to the caller verbatim and never produce
//! audit events.

use regex::Regex;
use std::sync::OnceLock;

/// Minimum password length, counted in characters.
pub const MIN_PASSWORD_CHARS: usize = 10;

/// Maximum length of first/last names, counted in characters.
pub const MAX_NAME_CHARS: usize = 100;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex must compile")
    })
}

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| Regex::new(r"^[a-f0-9]{40,128}$").expect("token regex must compile"))
}

/// The unique lookup key derived from a submitted email: trimmed and
/// lowercased. Display forms keep whatever casing the user typed.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    email_re().is_match(email.trim())
}

/// Shape gate for raw verification tokens; anything else is rejected
/// before a lookup is attempted. Generated tokens are lowercase hex.
#[must_use]
pub fn is_valid_token(raw_token: &str) -> bool {
    token_re().is_match(raw_token)
}

#[must_use]
pub fn meets_password_length(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_CHARS
}

/// Trim an optional name field, turning empty submissions into None.
#[must_use]
pub fn normalize_name(input: Option<&str>) -> Option<String> {
    let trimmed = input?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[must_use]
pub fn name_within_limit(name: Option<&str>) -> bool {
    name.is_none_or(|n| n.chars().count() <= MAX_NAME_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  Jean.Dupont@Example.COM "), "jean.dupont@example.com");
        assert_eq!(normalize_email("plain@example.com"), "plain@example.com");
    }

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(is_valid_email("jean@example.com"));
        assert!(is_valid_email("jean.dupont+cabinet@practice.fr"));
        assert!(is_valid_email(" padded@example.com "));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("no-tld@example"));
        assert!(!is_valid_email("spaces in@example.com"));
    }

    #[test]
    fn token_shape_bounds() {
        assert!(is_valid_token(&"a".repeat(40)));
        assert!(is_valid_token(&"0".repeat(128)));
        assert!(is_valid_token(
            "3f786850e387550fdab836ed7e6dc881de23001b3f786850e387550fdab836ed"
        ));

        assert!(!is_valid_token(&"a".repeat(39)));
        assert!(!is_valid_token(&"a".repeat(129)));
        assert!(!is_valid_token(&"A".repeat(64)));
        assert!(!is_valid_token("not-hex-at-all"));
        assert!(!is_valid_token(""));
    }

    #[test]
    fn password_length_counts_characters() {
        assert!(meets_password_length("abcdefghij"));
        assert!(!meets_password_length("short"));
        assert!(!meets_password_length(""));
        // 10 multibyte characters are 10 characters
        assert!(meets_password_length("éèêëàâäôöù"));
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(normalize_name(Some("  Jean ")), Some("Jean".to_string()));
        assert_eq!(normalize_name(Some("   ")), None);
        assert_eq!(normalize_name(None), None);

        assert!(name_within_limit(None));
        assert!(name_within_limit(Some(&"a".repeat(100))));
        assert!(!name_within_limit(Some(&"a".repeat(101))));
    }
}

//! Regex-based redaction of structured PII and confidentiality markers.
//!
//! Applied to raw page text before normalization when
//! `documents.redact = true`. Patterns run in a fixed order (email, phone,
//! SSN, card number, then confidentiality terms); each match is replaced by a
//! bracketed label.

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b").expect("valid email regex")
});

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b")
        .expect("valid phone regex")
});

static SSN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid ssn regex"));

static CREDIT_CARD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b").expect("valid credit card regex")
});

const CONFIDENTIAL_TERMS: &[&str] = &["confidential", "secret", "internal use only", "proprietary"];

static CONFIDENTIAL_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    CONFIDENTIAL_TERMS
        .iter()
        .map(|term| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term)))
                .expect("valid confidential term regex")
        })
        .collect()
});

/// Kind of sensitive content a pattern targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionKind {
    Email,
    Phone,
    Ssn,
    CreditCard,
    Confidential,
}

impl RedactionKind {
    pub fn label(&self) -> &'static str {
        match self {
            RedactionKind::Email => "[EMAIL]",
            RedactionKind::Phone => "[PHONE]",
            RedactionKind::Ssn => "[SSN]",
            RedactionKind::CreditCard => "[CREDIT_CARD]",
            RedactionKind::Confidential => "[CONFIDENTIAL]",
        }
    }
}

/// Replace every structured-PII match and confidentiality term in `text`.
pub fn redact_text(text: &str) -> String {
    let mut out = text.to_string();
    for (kind, re) in [
        (RedactionKind::Email, &*EMAIL_REGEX),
        (RedactionKind::Phone, &*PHONE_REGEX),
        (RedactionKind::Ssn, &*SSN_REGEX),
        (RedactionKind::CreditCard, &*CREDIT_CARD_REGEX),
    ] {
        out = re.replace_all(&out, kind.label()).into_owned();
    }
    for re in CONFIDENTIAL_REGEXES.iter() {
        out = re
            .replace_all(&out, RedactionKind::Confidential.label())
            .into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_email() {
        assert_eq!(
            redact_text("Contact ops@example.com today"),
            "Contact [EMAIL] today"
        );
    }

    #[test]
    fn redacts_phone() {
        assert_eq!(redact_text("Call 555-123-4567 now"), "Call [PHONE] now");
    }

    #[test]
    fn redacts_ssn() {
        assert_eq!(redact_text("SSN 123-45-6789."), "SSN [SSN].");
    }

    #[test]
    fn redacts_card_number() {
        assert_eq!(
            redact_text("card 4111-1111-1111-1111 on file"),
            "card [CREDIT_CARD] on file"
        );
    }

    #[test]
    fn redacts_confidential_terms_case_insensitively() {
        assert_eq!(
            redact_text("This is CONFIDENTIAL and for Internal Use Only."),
            "This is [CONFIDENTIAL] and for [CONFIDENTIAL]."
        );
    }

    #[test]
    fn leaves_partial_words_alone() {
        assert_eq!(redact_text("secretary"), "secretary");
    }

    #[test]
    fn plain_text_is_unchanged() {
        let text = "The firewall blocks port 80 traffic by default.";
        assert_eq!(redact_text(text), text);
    }
}

//! Core data models used throughout the questionnaire harness.
//!
//! These types represent the pages, answers, and model selectors that flow
//! through ingestion and the answering pipelines.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Answer text used when no backend produced anything for a question.
pub const NO_ANSWER_SENTINEL: &str = "No relevant information found in the provided context.";

/// Citation paired with [`NO_ANSWER_SENTINEL`] by the long-context backend.
pub const NO_ANSWER_CITATION: &str = "No relevant information found in any chunk.";

/// Answer text returned for every question when ingestion yields no text.
pub const NO_CONTENT_MESSAGE: &str = "Error: No valid content available after preprocessing.";

/// Placeholder used for missing sources and citations.
pub const NOT_AVAILABLE: &str = "N/A";

/// One page of extracted, sanitized document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPage {
    pub text: String,
    pub source: String,
    /// 1-based page number within `source`.
    pub page: u32,
}

/// The result for a single question. Exactly one is produced per input
/// question, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
    pub source: String,
    pub citation: String,
}

impl AnswerRecord {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        source: impl Into<String>,
        citation: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            source: source.into(),
            citation: citation.into(),
        }
    }

    /// The fixed "nothing found" record.
    pub fn sentinel(question: impl Into<String>) -> Self {
        Self::new(
            question,
            NO_ANSWER_SENTINEL,
            NOT_AVAILABLE,
            NO_ANSWER_CITATION,
        )
    }

    /// An error record carrying `message` as the answer text.
    pub fn error(question: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(question, message, NOT_AVAILABLE, NOT_AVAILABLE)
    }
}

/// A span returned by a local answerer.
///
/// `start`/`end` are whatever offsets the model variant reports: token
/// indices for span extraction, `(0, answer length)` for generation. They are
/// reused verbatim as character offsets when cutting citations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Span {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// The `("", 0, 0)` span produced when inference fails.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Which answering strategy a request selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelId {
    /// Local span-extraction QA model.
    Mpnet,
    /// Local BART sequence-to-sequence model.
    Bart,
    /// Local T5 sequence-to-sequence model.
    T5,
    /// Hosted chat-completion API, one request per question.
    ChatGpt,
    /// Hosted long-context assistant, chunked corpus.
    Claude,
}

impl ModelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Mpnet => "mpnet",
            ModelId::Bart => "bart",
            ModelId::T5 => "t5",
            ModelId::ChatGpt => "chatgpt",
            ModelId::Claude => "claude",
        }
    }

    /// Whether this selector runs against a hosted API and needs credentials.
    pub fn is_hosted(&self) -> bool {
        matches!(self, ModelId::ChatGpt | ModelId::Claude)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown model selector.
#[derive(Debug, thiserror::Error)]
#[error("Unsupported model: '{0}'. Must be mpnet, bart, t5, chatgpt, or claude.")]
pub struct ModelIdError(pub String);

impl FromStr for ModelId {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mpnet" => Ok(ModelId::Mpnet),
            "bart" => Ok(ModelId::Bart),
            "t5" => Ok(ModelId::T5),
            "chatgpt" => Ok(ModelId::ChatGpt),
            "claude" => Ok(ModelId::Claude),
            _ => Err(ModelIdError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_id_roundtrips_through_str() {
        for id in [
            ModelId::Mpnet,
            ModelId::Bart,
            ModelId::T5,
            ModelId::ChatGpt,
            ModelId::Claude,
        ] {
            assert_eq!(id.as_str().parse::<ModelId>().unwrap(), id);
        }
    }

    #[test]
    fn model_id_is_case_insensitive() {
        assert_eq!("Claude".parse::<ModelId>().unwrap(), ModelId::Claude);
        assert_eq!(" T5 ".parse::<ModelId>().unwrap(), ModelId::T5);
    }

    #[test]
    fn unknown_model_id_is_rejected() {
        let err = "gpt-j".parse::<ModelId>().unwrap_err();
        assert!(err.to_string().contains("gpt-j"));
    }

    #[test]
    fn sentinel_record_shape() {
        let r = AnswerRecord::sentinel("Q1");
        assert_eq!(r.question, "Q1");
        assert_eq!(r.answer, NO_ANSWER_SENTINEL);
        assert_eq!(r.source, "N/A");
        assert_eq!(r.citation, NO_ANSWER_CITATION);
    }
}

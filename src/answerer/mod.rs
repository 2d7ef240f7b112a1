//! Local question-answering models.
//!
//! Every local model implements [`QaModel`]. Two tract-backed variants are
//! compiled in with the `local-qa-tract` feature:
//!
//! | Model id | Variant | Offsets reported |
//! |----------|---------|------------------|
//! | `mpnet`  | [`span_tract::SpanModel`] | start/end token indices |
//! | `bart`, `t5` | [`seq2seq_tract::Seq2SeqModel`] | `(0, answer length)` |
//!
//! [`ExtractiveAnswerer`] wraps a model for the sliding-window search and
//! turns any inference failure into an empty span.

use anyhow::{bail, Result};
use tracing::error;

use crate::config::ModelsConfig;
use crate::models::{ModelId, Span};

#[cfg(feature = "local-qa-tract")]
pub mod seq2seq_tract;
#[cfg(feature = "local-qa-tract")]
pub mod span_tract;

/// A local model answering a question from one context window.
pub trait QaModel: Send + Sync {
    fn answer(&self, question: &str, context: &str) -> Result<Span>;
}

/// Failure-swallowing front for a [`QaModel`].
pub struct ExtractiveAnswerer {
    model: Box<dyn QaModel>,
}

impl ExtractiveAnswerer {
    pub fn new(model: Box<dyn QaModel>) -> Self {
        Self { model }
    }

    /// Answer `question` from `context`; errors are logged and become
    /// `("", 0, 0)`.
    pub fn answer(&self, question: &str, context: &str) -> Span {
        match self.model.answer(question, context) {
            Ok(span) => span,
            Err(e) => {
                error!(error = %e, "Answer extraction failed");
                Span::empty()
            }
        }
    }
}

/// Load the local model selected by `model_id`.
#[cfg(feature = "local-qa-tract")]
pub fn load_local_model(model_id: ModelId, config: &ModelsConfig) -> Result<Box<dyn QaModel>> {
    match model_id {
        ModelId::Mpnet => Ok(Box::new(span_tract::SpanModel::load(&config.span)?)),
        ModelId::Bart => Ok(Box::new(seq2seq_tract::Seq2SeqModel::load(&config.bart)?)),
        ModelId::T5 => Ok(Box::new(seq2seq_tract::Seq2SeqModel::load(&config.t5)?)),
        other => bail!("'{}' is a hosted model, not a local one", other),
    }
}

/// Load the local model selected by `model_id`.
#[cfg(not(feature = "local-qa-tract"))]
pub fn load_local_model(model_id: ModelId, _config: &ModelsConfig) -> Result<Box<dyn QaModel>> {
    if model_id.is_hosted() {
        bail!("'{}' is a hosted model, not a local one", model_id);
    }
    bail!(
        "Local model '{}' requires the local-qa-tract feature. \
         Rebuild with default features enabled.",
        model_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl QaModel for Failing {
        fn answer(&self, _question: &str, _context: &str) -> Result<Span> {
            bail!("model exploded")
        }
    }

    struct Echo;

    impl QaModel for Echo {
        fn answer(&self, question: &str, _context: &str) -> Result<Span> {
            Ok(Span::new(question, 1, 4))
        }
    }

    #[test]
    fn failures_become_empty_span() {
        let answerer = ExtractiveAnswerer::new(Box::new(Failing));
        assert_eq!(answerer.answer("q", "c"), Span::empty());
    }

    #[test]
    fn successful_span_passes_through() {
        let answerer = ExtractiveAnswerer::new(Box::new(Echo));
        assert_eq!(answerer.answer("hello", "c"), Span::new("hello", 1, 4));
    }

    #[test]
    fn hosted_ids_are_not_local_models() {
        let config = ModelsConfig::default();
        let err = load_local_model(ModelId::Claude, &config).err().unwrap();
        assert!(err.to_string().contains("hosted"));
    }
}

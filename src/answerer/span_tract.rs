//! Span-extraction QA on tract-onnx.
//!
//! Pure-Rust path: loads an ONNX question-answering export (start/end logits)
//! with tract-onnx and tokenizes the (question, context) pair with the
//! tokenizers crate. Inputs are truncated and padded to a fixed length.
//!
//! Start and end positions are independent argmaxes with `end = argmax + 1`.
//! When `end <= start` the span text is empty and the offsets are returned
//! unchanged.

use anyhow::{bail, Result};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tract_onnx::prelude::*;
use tracing::info;

use super::QaModel;
use crate::config::SpanModelConfig;
use crate::hub;
use crate::models::Span;

type Plan = TypedRunnableModel<TypedModel>;

/// ONNX start/end-logit model plus its tokenizer.
pub struct SpanModel {
    plan: Plan,
    input_names: Vec<String>,
    tokenizer: Tokenizer,
    max_len: usize,
}

impl SpanModel {
    /// Fetch the model and tokenizer named in `[models.span]` and build a
    /// runnable plan with a fixed `[1, max_seq_len]` input shape.
    pub fn load(config: &SpanModelConfig) -> Result<Self> {
        info!(repo = %config.repo, "Loading span QA model");
        let onnx_path = hub::fetch(&config.repo, &config.onnx_file)?;
        let mut tokenizer = hub::load_tokenizer(&config.repo, &config.tokenizer_file)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_seq_len,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Configure truncation: {}", e))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(config.max_seq_len),
            ..Default::default()
        }));

        let mut model = tract_onnx::onnx()
            .model_for_path(onnx_path)
            .map_err(|e| anyhow::anyhow!("Load ONNX: {}", e))?;
        let input_names = input_names(&model)?;
        for i in 0..input_names.len() {
            model
                .set_input_fact(i, i64::fact([1, config.max_seq_len]).into())
                .map_err(|e| anyhow::anyhow!("Set input shape: {}", e))?;
        }
        let plan = model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("Optimize: {}", e))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("Build tract runnable: {}", e))?;

        Ok(Self {
            plan,
            input_names,
            tokenizer,
            max_len: config.max_seq_len,
        })
    }
}

impl QaModel for SpanModel {
    fn answer(&self, question: &str, context: &str) -> Result<Span> {
        let encoding = self
            .tokenizer
            .encode((question, context), true)
            .map_err(|e| anyhow::anyhow!("Tokenize: {}", e))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        if ids.len() != self.max_len {
            bail!("Expected {} tokens after padding, got {}", self.max_len, ids.len());
        }

        let mut inputs = TVec::new();
        for name in &self.input_names {
            let values = match name.as_str() {
                "input_ids" => &ids,
                "attention_mask" => &mask,
                "token_type_ids" => &type_ids,
                other => bail!("Unexpected model input '{}'", other),
            };
            inputs.push(row_tensor(values)?.into());
        }

        let outputs = self.plan.run(inputs)?;
        if outputs.len() < 2 {
            bail!("Expected start and end logits, got {} outputs", outputs.len());
        }
        let (start, end) = span_from_logits(&logits(&outputs[0])?, &logits(&outputs[1])?)
            .ok_or_else(|| anyhow::anyhow!("Empty logits"))?;

        let text = match answer_tokens(start, end, encoding.get_ids().len()) {
            Some(range) => self
                .tokenizer
                .decode(&encoding.get_ids()[range], false)
                .map_err(|e| anyhow::anyhow!("Decode: {}", e))?,
            None => String::new(),
        };

        Ok(Span::new(text, start, end))
    }
}

/// Graph input names, in input order.
pub(crate) fn input_names(model: &InferenceModel) -> Result<Vec<String>> {
    Ok(model
        .input_outlets()
        .map_err(|e| anyhow::anyhow!("Model inputs: {}", e))?
        .iter()
        .map(|outlet| model.node(outlet.node).name.clone())
        .collect())
}

/// A `[1, n]` i64 tensor.
pub(crate) fn row_tensor(values: &[i64]) -> Result<Tensor> {
    let array = ndarray::Array2::from_shape_vec((1, values.len()), values.to_vec())
        .map_err(|e| anyhow::anyhow!("Input shape: {}", e))?;
    Ok(array.into())
}

fn logits(output: &TValue) -> Result<Vec<f32>> {
    Ok(output
        .to_array_view::<f32>()
        .map_err(|e| anyhow::anyhow!("Output to array: {}", e))?
        .iter()
        .copied()
        .collect())
}

/// Index of the largest value; the first one wins on ties.
fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None::<(usize, f32)>, |best, (i, &v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// `(start, end)` from independent argmaxes, with `end` one past the end
/// logit's argmax. Nothing ties the two together, so `end <= start` is
/// possible.
fn span_from_logits(start_logits: &[f32], end_logits: &[f32]) -> Option<(usize, usize)> {
    Some((argmax(start_logits)?, argmax(end_logits)? + 1))
}

/// Token range to decode for a span over `len` tokens, or `None` when the
/// span is empty.
fn answer_tokens(start: usize, end: usize, len: usize) -> Option<std::ops::Range<usize>> {
    let end = end.min(len);
    (end > start).then_some(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_maximum_wins_ties() {
        assert_eq!(argmax(&[0.1, 0.9, 0.9, 0.2]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn end_is_one_past_its_argmax() {
        let start = [0.0, 5.0, 1.0, 0.0];
        let end = [0.0, 0.0, 1.0, 7.0];
        assert_eq!(span_from_logits(&start, &end), Some((1, 4)));
        assert_eq!(answer_tokens(1, 4, 4), Some(1..4));
    }

    #[test]
    fn inverted_argmaxes_keep_offsets_and_empty_text() {
        let start = [0.0, 0.0, 0.0, 9.0];
        let end = [8.0, 0.0, 0.0, 0.0];
        let (s, e) = span_from_logits(&start, &end).unwrap();
        assert_eq!((s, e), (3, 1));
        assert_eq!(answer_tokens(s, e, 4), None);
    }

    #[test]
    fn equal_argmaxes_give_a_one_token_span() {
        let logits = [0.0, 3.0, 3.0];
        assert_eq!(span_from_logits(&logits, &logits), Some((1, 2)));
        assert_eq!(answer_tokens(1, 2, 3), Some(1..2));
    }

    #[test]
    fn span_past_the_sequence_is_clamped() {
        assert_eq!(answer_tokens(2, 9, 5), Some(2..5));
        assert_eq!(answer_tokens(5, 9, 5), None);
    }
}

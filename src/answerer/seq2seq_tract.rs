//! Generative QA on tract-onnx (BART / T5 encoder-decoder exports).
//!
//! The prompt `question: {q} context: {c}` is encoded once, then the decoder
//! is run step by step under beam search. The decoder export has no
//! key/value cache inputs, so each step re-feeds the whole prefix.
//!
//! Decoding honours the model's generation settings: a forced first token,
//! a minimum length before `eos`, n-gram repeat blocking and a length
//! penalty on finished hypotheses.
//!
//! The reported span is always `(0, answer length)`.

use anyhow::{bail, Result};
use tokenizers::{Tokenizer, TruncationParams};
use tract_onnx::prelude::*;
use tracing::{debug, info};

use super::span_tract::{input_names, row_tensor};
use super::QaModel;
use crate::config::Seq2SeqModelConfig;
use crate::hub;
use crate::models::Span;

type Plan = TypedRunnableModel<TypedModel>;

/// Encoder and decoder plans with generation settings.
pub struct Seq2SeqModel {
    encoder: Plan,
    encoder_inputs: Vec<String>,
    decoder: Plan,
    decoder_inputs: Vec<String>,
    tokenizer: Tokenizer,
    generation: Generation,
}

/// Beam search settings.
#[derive(Debug, Clone, PartialEq)]
struct Generation {
    start: u32,
    eos: u32,
    width: usize,
    max_new: usize,
    min_new: usize,
    forced_first: Option<u32>,
    no_repeat_ngram: usize,
    length_penalty: f32,
}

impl Generation {
    fn from_config(config: &Seq2SeqModelConfig) -> Self {
        Self {
            start: config.decoder_start_token_id,
            eos: config.eos_token_id,
            width: config.num_beams.max(1),
            max_new: config.max_new_tokens,
            min_new: config.min_new_tokens,
            forced_first: config.forced_bos_token_id,
            no_repeat_ngram: config.no_repeat_ngram_size,
            length_penalty: config.length_penalty,
        }
    }

    /// Mask tokens that may not follow `prefix` (start token included).
    fn constrain(&self, prefix: &[u32], logprobs: &mut [f32]) {
        let generated = prefix.len().saturating_sub(1);
        if generated == 0 {
            if let Some(forced) = self.forced_first {
                for (i, lp) in logprobs.iter_mut().enumerate() {
                    if i as u32 != forced {
                        *lp = f32::NEG_INFINITY;
                    }
                }
            }
        }
        if generated < self.min_new {
            if let Some(lp) = logprobs.get_mut(self.eos as usize) {
                *lp = f32::NEG_INFINITY;
            }
        }
        for token in banned_by_ngram(prefix, self.no_repeat_ngram) {
            if let Some(lp) = logprobs.get_mut(token as usize) {
                *lp = f32::NEG_INFINITY;
            }
        }
    }
}

/// Tokens that would complete an n-gram of size `n` already in `prefix`.
fn banned_by_ngram(prefix: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || prefix.len() + 1 < n {
        return Vec::new();
    }
    let tail = &prefix[prefix.len() + 1 - n..];
    prefix
        .windows(n)
        .filter(|gram| &gram[..n - 1] == tail)
        .map(|gram| gram[n - 1])
        .collect()
}

fn load_plan(path: std::path::PathBuf) -> Result<(Plan, Vec<String>)> {
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .map_err(|e| anyhow::anyhow!("Load ONNX: {}", e))?;
    let names = input_names(&model)?;
    let plan = model
        .into_optimized()
        .map_err(|e| anyhow::anyhow!("Optimize: {}", e))?
        .into_runnable()
        .map_err(|e| anyhow::anyhow!("Build tract runnable: {}", e))?;
    Ok((plan, names))
}

impl Seq2SeqModel {
    pub fn load(config: &Seq2SeqModelConfig) -> Result<Self> {
        info!(repo = %config.repo, "Loading generative QA model");
        let encoder_path = hub::fetch(&config.repo, &config.encoder_file)?;
        let decoder_path = hub::fetch(&config.repo, &config.decoder_file)?;
        let mut tokenizer = hub::load_tokenizer(&config.repo, &config.tokenizer_file)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_input_tokens,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Configure truncation: {}", e))?;
        tokenizer.with_padding(None);

        let (encoder, encoder_inputs) = load_plan(encoder_path)?;
        let (decoder, decoder_inputs) = load_plan(decoder_path)?;

        Ok(Self {
            encoder,
            encoder_inputs,
            decoder,
            decoder_inputs,
            tokenizer,
            generation: Generation::from_config(config),
        })
    }

    fn encode(&self, ids: &[i64], mask: &[i64]) -> Result<TValue> {
        let mut inputs = TVec::new();
        for name in &self.encoder_inputs {
            let values = match name.as_str() {
                "input_ids" => ids,
                "attention_mask" => mask,
                other => bail!("Unexpected encoder input '{}'", other),
            };
            inputs.push(row_tensor(values)?.into());
        }
        let mut outputs = self.encoder.run(inputs)?;
        if outputs.is_empty() {
            bail!("Encoder produced no output");
        }
        Ok(outputs.remove(0))
    }

    /// Log-probabilities of the next token after `prefix`.
    fn next_token_logprobs(&self, prefix: &[u32], hidden: &TValue, mask: &[i64]) -> Result<Vec<f32>> {
        let prefix: Vec<i64> = prefix.iter().map(|&t| t as i64).collect();
        let mut inputs = TVec::new();
        for name in &self.decoder_inputs {
            let value: TValue = match name.as_str() {
                "input_ids" => row_tensor(&prefix)?.into(),
                "encoder_attention_mask" => row_tensor(mask)?.into(),
                "encoder_hidden_states" => hidden.clone(),
                other => bail!("Unexpected decoder input '{}'", other),
            };
            inputs.push(value);
        }
        let outputs = self.decoder.run(inputs)?;
        let logits = outputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("Decoder produced no output"))?
            .to_array_view::<f32>()
            .map_err(|e| anyhow::anyhow!("Output to array: {}", e))?;
        let shape = logits.shape();
        if shape.len() != 3 || shape[1] == 0 {
            bail!("Unexpected logits shape: {:?}", shape);
        }
        let last = logits.slice(ndarray::s![0, shape[1] - 1, ..]);
        Ok(log_softmax(last.iter().copied()))
    }
}

impl QaModel for Seq2SeqModel {
    fn answer(&self, question: &str, context: &str) -> Result<Span> {
        let prompt = format!("question: {} context: {}", question, context);
        let encoding = self
            .tokenizer
            .encode(prompt.as_str(), true)
            .map_err(|e| anyhow::anyhow!("Tokenize: {}", e))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mask = vec![1i64; ids.len()];
        let hidden = self.encode(&ids, &mask)?;

        let generated = beam_search(&self.generation, |prefix| {
            self.next_token_logprobs(prefix, &hidden, &mask)
        })?;
        debug!(tokens = generated.len(), "Generated answer");

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| anyhow::anyhow!("Decode: {}", e))?;
        Ok(generated_span(text))
    }
}

/// Generated text reported as `(0, length in chars)`.
fn generated_span(text: String) -> Span {
    let len = text.chars().count();
    Span::new(text, 0, len)
}

fn log_softmax(values: impl Iterator<Item = f32> + Clone) -> Vec<f32> {
    let max = values.clone().fold(f32::NEG_INFINITY, f32::max);
    let sum: f32 = values.clone().map(|v| (v - max).exp()).sum();
    let log_sum = sum.ln() + max;
    values.map(|v| v - log_sum).collect()
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    score: f32,
}

impl Hypothesis {
    /// Sum of log-probabilities divided by `length ^ penalty`.
    fn normalized(&self, penalty: f32) -> f32 {
        self.score / (self.tokens.len().max(1) as f32).powf(penalty)
    }
}

/// Beam search with early stopping: generation ends once `width` hypotheses
/// have emitted `eos`, or after `max_new` steps. Returns the best hypothesis
/// without the start token and without `eos`.
fn beam_search<F>(settings: &Generation, mut step: F) -> Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> Result<Vec<f32>>,
{
    let width = settings.width.max(1);
    let eos = settings.eos;
    let mut beams = vec![Hypothesis {
        tokens: vec![settings.start],
        score: 0.0,
    }];
    let mut finished: Vec<Hypothesis> = Vec::new();

    for _ in 0..settings.max_new {
        let mut candidates: Vec<(usize, u32, f32)> = Vec::new();
        for (b, beam) in beams.iter().enumerate() {
            let mut logprobs = step(&beam.tokens)?;
            settings.constrain(&beam.tokens, &mut logprobs);
            for (token, lp) in top_k(&logprobs, 2 * width) {
                if lp.is_finite() {
                    candidates.push((b, token, beam.score + lp));
                }
            }
        }
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut next = Vec::with_capacity(width);
        for (rank, (b, token, score)) in candidates.into_iter().enumerate() {
            let mut tokens = beams[b].tokens.clone();
            tokens.push(token);
            if token == eos {
                if rank < width {
                    finished.push(Hypothesis { tokens, score });
                }
            } else {
                next.push(Hypothesis { tokens, score });
            }
            if next.len() == width {
                break;
            }
        }

        if finished.len() >= width || next.is_empty() {
            break;
        }
        beams = next;
    }

    let pool = if finished.is_empty() { beams } else { finished };
    let best = pool
        .into_iter()
        .max_by(|a, b| {
            a.normalized(settings.length_penalty)
                .total_cmp(&b.normalized(settings.length_penalty))
        })
        .ok_or_else(|| anyhow::anyhow!("Beam search produced no hypothesis"))?;

    Ok(best
        .tokens
        .into_iter()
        .skip(1)
        .filter(|&t| t != eos)
        .collect())
}

/// The `k` highest log-probabilities as `(token, logprob)`, best first.
fn top_k(logprobs: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut indexed: Vec<(u32, f32)> = logprobs
        .iter()
        .enumerate()
        .map(|(i, &lp)| (i as u32, lp))
        .collect();
    let k = k.min(indexed.len());
    if k == 0 {
        return Vec::new();
    }
    if k < indexed.len() {
        indexed.select_nth_unstable_by(k - 1, |a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);
    }
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed
}

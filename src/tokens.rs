//! Token counting for chunk budgets.
//!
//! [`HfTokenCounter`] counts with a real tokenizer (`tokenizer.json` from the
//! model cache). [`CharRatioCounter`] is the 4-chars-per-token estimate for
//! offline runs.

use anyhow::Result;

use crate::config::{ChunkingConfig, CounterKind};
use crate::hub;

/// Counts tokens in a string.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> Result<usize>;
}

/// Tokenizer-accurate counter backed by the `tokenizers` crate.
pub struct HfTokenCounter {
    tokenizer: tokenizers::Tokenizer,
}

impl HfTokenCounter {
    pub fn new(tokenizer: tokenizers::Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Load the tokenizer named in `[chunking]`, downloading it on first use.
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        let tokenizer = hub::load_tokenizer(&config.tokenizer_repo, &config.tokenizer_file)?;
        Ok(Self::new(tokenizer))
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenize: {}", e))?;
        Ok(encoding.get_ids().len())
    }
}

/// Build the counter selected by `[chunking] counter`.
pub fn build_counter(config: &ChunkingConfig) -> Result<Box<dyn TokenCounter>> {
    match config.counter {
        CounterKind::Tokenizer => Ok(Box::new(HfTokenCounter::from_config(config)?)),
        CounterKind::Chars => Ok(Box::new(CharRatioCounter)),
    }
}

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Estimates tokens as `ceil(chars / 4)`.
pub struct CharRatioCounter;

impl TokenCounter for CharRatioCounter {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(text.chars().count().div_ceil(CHARS_PER_TOKEN))
    }
}

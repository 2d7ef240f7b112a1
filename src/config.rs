use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub hosted: HostedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_dir")]
    pub dir: PathBuf,
    /// Run the regex redaction pass during ingestion. Off by default because
    /// the document directory is expected to hold already-anonymized PDFs.
    #[serde(default)]
    pub redact: bool,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_documents_dir(),
            redact: false,
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./uploads/anonymized")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
    #[serde(default = "default_stride_chars")]
    pub stride_chars: usize,
    #[serde(default = "default_citation_pad_chars")]
    pub citation_pad_chars: usize,
    /// Answers of this many characters or fewer count as no finding.
    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
    #[serde(default = "default_summary_word_limit")]
    pub summary_word_limit: usize,
    #[serde(default = "default_summary_sentences")]
    pub summary_sentences: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            window_chars: default_window_chars(),
            stride_chars: default_stride_chars(),
            citation_pad_chars: default_citation_pad_chars(),
            min_answer_chars: default_min_answer_chars(),
            summary_word_limit: default_summary_word_limit(),
            summary_sentences: default_summary_sentences(),
        }
    }
}

fn default_window_chars() -> usize {
    1000
}
fn default_stride_chars() -> usize {
    500
}
fn default_citation_pad_chars() -> usize {
    100
}
fn default_min_answer_chars() -> usize {
    5
}
fn default_summary_word_limit() -> usize {
    50
}
fn default_summary_sentences() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_max_tokens")]
    pub max_tokens: usize,
    /// Hugging Face repo holding the `tokenizer.json` used to count tokens.
    #[serde(default = "default_tokenizer_repo")]
    pub tokenizer_repo: String,
    #[serde(default = "default_tokenizer_file")]
    pub tokenizer_file: String,
    /// `tokenizer` counts with the downloaded tokenizer; `chars` estimates
    /// four characters per token and needs no download.
    #[serde(default)]
    pub counter: CounterKind,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    #[default]
    Tokenizer,
    Chars,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_chunk_max_tokens(),
            tokenizer_repo: default_tokenizer_repo(),
            tokenizer_file: default_tokenizer_file(),
            counter: CounterKind::default(),
        }
    }
}

fn default_chunk_max_tokens() -> usize {
    90_000
}
fn default_tokenizer_repo() -> String {
    // cl100k_base in tokenizer.json form
    "Xenova/gpt-4".to_string()
}
fn default_tokenizer_file() -> String {
    "tokenizer.json".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    #[serde(default = "default_span_model")]
    pub span: SpanModelConfig,
    #[serde(default = "default_bart_model")]
    pub bart: Seq2SeqModelConfig,
    #[serde(default = "default_t5_model")]
    pub t5: Seq2SeqModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            span: default_span_model(),
            bart: default_bart_model(),
            t5: default_t5_model(),
        }
    }
}

/// ONNX span-extraction model (start/end logits).
#[derive(Debug, Deserialize, Clone)]
pub struct SpanModelConfig {
    pub repo: String,
    #[serde(default = "default_onnx_file")]
    pub onnx_file: String,
    #[serde(default = "default_tokenizer_file")]
    pub tokenizer_file: String,
    #[serde(default = "default_span_max_seq_len")]
    pub max_seq_len: usize,
}

fn default_span_model() -> SpanModelConfig {
    SpanModelConfig {
        repo: "Xenova/distilbert-base-cased-distilled-squad".to_string(),
        onnx_file: default_onnx_file(),
        tokenizer_file: default_tokenizer_file(),
        max_seq_len: default_span_max_seq_len(),
    }
}

fn default_onnx_file() -> String {
    "onnx/model.onnx".to_string()
}
fn default_span_max_seq_len() -> usize {
    512
}

/// ONNX encoder/decoder pair for generative answering.
#[derive(Debug, Deserialize, Clone)]
pub struct Seq2SeqModelConfig {
    pub repo: String,
    #[serde(default = "default_encoder_file")]
    pub encoder_file: String,
    #[serde(default = "default_decoder_file")]
    pub decoder_file: String,
    #[serde(default = "default_tokenizer_file")]
    pub tokenizer_file: String,
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
    #[serde(default = "default_num_beams")]
    pub num_beams: usize,
    /// Generated tokens before `eos` may be emitted.
    #[serde(default)]
    pub min_new_tokens: usize,
    /// Token forced as the first generated token.
    #[serde(default)]
    pub forced_bos_token_id: Option<u32>,
    /// Ban repeating any n-gram of this size; 0 disables.
    #[serde(default)]
    pub no_repeat_ngram_size: usize,
    /// Exponent on hypothesis length when ranking finished beams.
    #[serde(default = "default_length_penalty")]
    pub length_penalty: f32,
    pub decoder_start_token_id: u32,
    pub eos_token_id: u32,
}

fn default_bart_model() -> Seq2SeqModelConfig {
    Seq2SeqModelConfig {
        repo: "Xenova/bart-large-cnn".to_string(),
        encoder_file: default_encoder_file(),
        decoder_file: default_decoder_file(),
        tokenizer_file: default_tokenizer_file(),
        max_input_tokens: default_max_input_tokens(),
        max_new_tokens: default_max_new_tokens(),
        num_beams: default_num_beams(),
        min_new_tokens: 55,
        forced_bos_token_id: Some(0),
        no_repeat_ngram_size: 3,
        length_penalty: 2.0,
        decoder_start_token_id: 2,
        eos_token_id: 2,
    }
}

fn default_t5_model() -> Seq2SeqModelConfig {
    Seq2SeqModelConfig {
        repo: "Xenova/t5-base".to_string(),
        encoder_file: default_encoder_file(),
        decoder_file: default_decoder_file(),
        tokenizer_file: default_tokenizer_file(),
        max_input_tokens: default_max_input_tokens(),
        max_new_tokens: default_max_new_tokens(),
        num_beams: default_num_beams(),
        min_new_tokens: 0,
        forced_bos_token_id: None,
        no_repeat_ngram_size: 0,
        length_penalty: default_length_penalty(),
        decoder_start_token_id: 0,
        eos_token_id: 1,
    }
}

fn default_encoder_file() -> String {
    "onnx/encoder_model.onnx".to_string()
}
fn default_decoder_file() -> String {
    "onnx/decoder_model.onnx".to_string()
}
fn default_max_input_tokens() -> usize {
    1024
}
fn default_max_new_tokens() -> usize {
    150
}
fn default_num_beams() -> usize {
    4
}
fn default_length_penalty() -> f32 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct HostedConfig {
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_chat_url")]
    pub chat_url: String,
    #[serde(default = "default_long_context_model")]
    pub long_context_model: String,
    #[serde(default = "default_long_context_url")]
    pub long_context_url: String,
    /// Reply budget for each long-context chunk request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            chat_model: default_chat_model(),
            chat_url: default_chat_url(),
            long_context_model: default_long_context_model(),
            long_context_url: default_long_context_url(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_chat_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_long_context_model() -> String {
    "claude-3-opus-20240229".to_string()
}
fn default_long_context_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}
fn default_max_tokens() -> u32 {
    3000
}
fn default_timeout_secs() -> u64 {
    600
}

/// Load configuration from `path`.
///
/// A missing file yields [`Config::default`]; a file that exists but does
/// not parse or validate is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.search.window_chars == 0 {
        anyhow::bail!("search.window_chars must be > 0");
    }
    if config.search.stride_chars == 0 {
        anyhow::bail!("search.stride_chars must be > 0");
    }
    if config.search.stride_chars > config.search.window_chars {
        anyhow::bail!(
            "search.stride_chars ({}) must not exceed search.window_chars ({})",
            config.search.stride_chars,
            config.search.window_chars
        );
    }
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }
    for (name, model) in [("bart", &config.models.bart), ("t5", &config.models.t5)] {
        if model.num_beams == 0 {
            anyhow::bail!("models.{}.num_beams must be >= 1", name);
        }
        if model.max_new_tokens == 0 {
            anyhow::bail!("models.{}.max_new_tokens must be > 0", name);
        }
        if model.min_new_tokens >= model.max_new_tokens {
            anyhow::bail!(
                "models.{}.min_new_tokens must be below max_new_tokens",
                name
            );
        }
    }
    if config.models.span.max_seq_len == 0 {
        anyhow::bail!("models.span.max_seq_len must be > 0");
    }
    Ok(())
}

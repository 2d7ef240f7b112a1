//! Blocking clients for the hosted answering APIs.
//!
//! Both clients implement [`ChatClient`]: one system instruction, one user
//! message, free text back. Requests are sent once; there are no retries.
//!
//! | Client | Endpoint | Auth |
//! |--------|----------|------|
//! | [`OpenAiChatClient`] | `POST {chat_url}/chat/completions` | `Authorization: Bearer` |
//! | [`AnthropicClient`] | `POST {long_context_url}/messages` | `x-api-key` + `anthropic-version` |

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::HostedConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A single-turn request to a hosted model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// Reply length cap; `None` leaves it to the provider.
    pub max_tokens: Option<u32>,
}

/// A hosted model that answers one request with free text.
pub trait ChatClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Model name reported as the answer source.
    fn model(&self) -> &str;
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

fn require_key(api_key: &str, provider: &str) -> Result<String> {
    let key = api_key.trim();
    if key.is_empty() {
        bail!("{} API key is required", provider);
    }
    Ok(key.to_string())
}

// ─── OpenAI chat completions ───────────────────────────────────────────────

pub struct OpenAiChatClient {
    api_key: String,
    model: String,
    url: String,
    client: Client,
}

impl OpenAiChatClient {
    pub fn new(api_key: &str, config: &HostedConfig) -> Result<Self> {
        Ok(Self {
            api_key: require_key(api_key, "OpenAI")?,
            model: config.chat_model.clone(),
            url: format!("{}/chat/completions", config.chat_url.trim_end_matches('/')),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient for OpenAiChatClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
        };

        debug!(model = %self.model, chars = request.user.len(), "Sending chat completion");
        let resp = self
            .client
            .post(&self.url)
            .headers(headers)
            .json(&body)
            .send()
            .context("failed to call chat completions API")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("OpenAI returned {}: {}", status, text);
        }
        let parsed: ChatCompletionResponse =
            resp.json().context("failed to parse chat completion response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("chat completion response has no content"))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ─── Anthropic messages ────────────────────────────────────────────────────

pub struct AnthropicClient {
    api_key: String,
    model: String,
    url: String,
    client: Client,
}

impl AnthropicClient {
    pub fn new(api_key: &str, config: &HostedConfig) -> Result<Self> {
        Ok(Self {
            api_key: require_key(api_key, "Anthropic")?,
            model: config.long_context_model.clone(),
            url: format!("{}/messages", config.long_context_url.trim_end_matches('/')),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Anthropic requires a reply cap on every request.
const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 1024;

impl ChatClient for AnthropicClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key).context("invalid Anthropic API key")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_ANTHROPIC_MAX_TOKENS),
            system: &request.system,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.user,
            }],
        };

        debug!(model = %self.model, chars = request.user.len(), "Sending messages request");
        let resp = self
            .client
            .post(&self.url)
            .headers(headers)
            .json(&body)
            .send()
            .context("failed to call Anthropic messages API")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("Anthropic returned {}: {}", status, text);
        }
        let parsed: MessagesResponse = resp.json().context("failed to parse Anthropic response")?;
        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if answer.is_empty() {
            bail!("Anthropic response missing text content");
        }
        Ok(answer)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

//! Anthropic Messages API client. Only the document generator talks to the
//! model, and it does so through [`TextCompleter`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// Fixed so that generated documents stay comparable across deployments.
pub const MODEL: &str = "claude-sonnet-4-5";
/// A full one-page LaTeX document fits comfortably.
const MAX_TOKENS: u32 = 8192;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Text-in, text-out completion.
#[async_trait]
pub trait TextCompleter: Send + Sync {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError>;
}

/// How many times a transient failure is retried and how long to wait between tries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `n` (0-based): none, then base, 2×base, 4×base...
    fn delay_before(&self, n: u32) -> Option<Duration> {
        n.checked_sub(1).map(|k| self.base_delay * (1u32 << k.min(16)))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserTurn<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ResponseBlock>,
    pub usage: TokenUsage,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl MessagesResponse {
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .find_map(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Outcome of a single HTTP round trip.
enum Attempt {
    Done(MessagesResponse),
    Transient(LlmError),
}

/// 429 and 5xx are worth another try; every other failure status is final.
fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    api_key: String,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key,
            retry: RetryPolicy::default(),
        })
    }

    /// One user turn under `system`. Transient failures are retried per the
    /// client's [`RetryPolicy`].
    pub async fn call(&self, prompt: &str, system: &str) -> Result<MessagesResponse, LlmError> {
        let body = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: [UserTurn {
                role: "user",
                content: prompt,
            }],
        };

        let mut last_error = None;
        for n in 0..self.retry.attempts {
            if let Some(delay) = self.retry.delay_before(n) {
                warn!(attempt = n, delay_ms = delay.as_millis() as u64, "Retrying LLM call");
                tokio::time::sleep(delay).await;
            }
            match self.send_once(&body).await? {
                Attempt::Done(response) => {
                    debug!(
                        input_tokens = response.usage.input_tokens,
                        output_tokens = response.usage.output_tokens,
                        stop_reason = response.stop_reason.as_deref().unwrap_or("-"),
                        "LLM call succeeded"
                    );
                    return Ok(response);
                }
                Attempt::Transient(e) => {
                    warn!("LLM call failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: self.retry.attempts,
        }))
    }

    async fn send_once(&self, body: &MessagesRequest<'_>) -> Result<Attempt, LlmError> {
        let sent = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await;
        let response = match sent {
            Ok(r) => r,
            Err(e) => return Ok(Attempt::Transient(LlmError::Http(e))),
        };

        let status = response.status();
        if status.is_success() {
            return Ok(Attempt::Done(response.json().await?));
        }

        let error = LlmError::Api {
            status: status.as_u16(),
            message: api_error_message(response.text().await.unwrap_or_default()),
        };
        if is_transient(status) {
            Ok(Attempt::Transient(error))
        } else {
            Err(error)
        }
    }
}

#[async_trait]
impl TextCompleter for LlmClient {
    /// First text block of the reply, with any markdown code fence removed.
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, system).await?;
        let text = response
            .first_text()
            .map(strip_code_fences)
            .filter(|t| !t.is_empty())
            .ok_or(LlmError::EmptyContent)?;
        Ok(text.to_string())
    }
}

/// The `error.message` field of an API error body, or the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

/// Removes a surrounding markdown fence (with or without a language tag).
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(idx) if rest[..idx].chars().all(|c| c.is_ascii_alphanumeric()) => &rest[idx + 1..],
        _ => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

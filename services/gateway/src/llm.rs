//! Upstream text-completion API
//!
//! The gateway only needs a lazy sequence of text fragments from the model.
//! [`CompletionProvider`] is that seam; [`OpenAiCompatibleProvider`] talks to
//! any OpenAI-compatible `/chat/completions` endpoint with streaming enabled.

use async_trait::async_trait;
use common::{Role, SseDecoder};
use futures::{Stream, StreamExt, stream::BoxStream};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Completion API configuration
#[derive(Clone)]
pub struct LlmConfig {
    /// API key, generation fails in-stream when absent
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token budget
    pub max_tokens: u32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Role of a prompt message sent upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl From<Role> for PromptRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => PromptRole::User,
            Role::Assistant => PromptRole::Assistant,
        }
    }
}

/// One role-tagged message of a completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

/// A completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Upstream failures
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("LLM API key not configured")]
    NotConfigured,

    #[error("Completion request failed: {0}")]
    Transport(String),

    #[error("Completion API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Completion API error: {0}")]
    Api(String),

    #[error("Malformed completion response: {0}")]
    Malformed(String),
}

/// Lazy, finite, non-restartable sequence of text fragments
pub type TextStream = BoxStream<'static, Result<String, UpstreamError>>;

/// A streaming text-completion backend
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Start a completion; fragments arrive in generation order
    async fn stream_completion(&self, request: CompletionRequest) -> Result<TextStream, UpstreamError>;
}

/// OpenAI-compatible streaming provider
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: LlmConfig,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: LlmConfig) -> Result<Self, UpstreamError> {
        // No overall timeout: a generation may legitimately stream for minutes
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    async fn stream_completion(&self, request: CompletionRequest) -> Result<TextStream, UpstreamError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(UpstreamError::NotConfigured)?;

        let body = json!({
            "model": self.config.model,
            "messages": request.messages,
            "stream": true,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let url = self.endpoint();
        info!("Completion request to {} model={}", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            error!("Completion API error {}: {}", status, truncate(&body_text, 500));
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: api_error_message(&body_text).unwrap_or_else(|| truncate(&body_text, 200)),
            });
        }

        Ok(decode_completion_stream(response.bytes_stream()))
    }
}

/// Turn an upstream SSE byte stream into text fragments
pub fn decode_completion_stream<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        failure: None,
        finished: false,
    };

    futures::stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Ok(Some((fragment, state)));
            }
            // Fragments decoded before a failure are still delivered first
            if let Some(err) = state.failure.take() {
                return Err(err);
            }
            if state.finished {
                return Ok(None);
            }

            let payloads = match state.bytes.next().await {
                Some(Ok(chunk)) => state.decoder.feed(chunk.as_ref()),
                Some(Err(e)) => return Err(UpstreamError::Transport(e.to_string())),
                None => {
                    state.finished = true;
                    state.decoder.finish().into_iter().collect()
                }
            };

            for payload in payloads {
                match parse_payload(&payload) {
                    Ok(Delta::Text(text)) => state.pending.push_back(text),
                    Ok(Delta::Empty) => {}
                    Ok(Delta::Done) => {
                        state.finished = true;
                        break;
                    }
                    Err(err) => {
                        state.failure = Some(err);
                        state.finished = true;
                        break;
                    }
                }
            }
        }
    })
    .boxed()
}

struct DecodeState<S> {
    bytes: std::pin::Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    failure: Option<UpstreamError>,
    finished: bool,
}

enum Delta {
    Text(String),
    Done,
    Empty,
}

fn parse_payload(payload: &str) -> Result<Delta, UpstreamError> {
    if payload.trim() == "[DONE]" {
        return Ok(Delta::Done);
    }

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| UpstreamError::Malformed(format!("{}: {}", e, truncate(payload, 200))))?;

    if let Some(message) = api_error_from_value(&value) {
        return Err(UpstreamError::Api(message));
    }

    let text = value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    if text.is_empty() {
        Ok(Delta::Empty)
    } else {
        Ok(Delta::Text(text.to_string()))
    }
}

fn api_error_from_value(value: &Value) -> Option<String> {
    let error = value.get("error").filter(|error| !error.is_null())?;
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .or_else(|| error.as_str().map(ToString::to_string))
        .unwrap_or_else(|| error.to_string());
    Some(message)
}

fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| api_error_from_value(&value))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

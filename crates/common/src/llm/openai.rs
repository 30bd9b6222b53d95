//! OpenAI-compatible chat completions

use super::{ChatClient, ChatMessage, ChatRequest, TokenStream};
use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::retry::with_retry;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI chat client
pub struct OpenAIChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a ChatRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIChatClient {
    /// Create a new OpenAI chat client
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "llm.api_key is required for the openai provider".to_string(),
        })?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            timeout,
            max_retries: config.max_retries,
        })
    }

    async fn send(&self, body: &WireRequest<'_>, timeout: Option<Duration>) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self.client.post(&url).bearer_auth(&self.api_key).json(body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("API error {}: {}", status, body);
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                AppError::ServiceUnavailable { message }
            } else {
                AppError::Llm { message }
            });
        }

        Ok(response)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::UpstreamTimeout {
                service: "llm".to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            AppError::HttpClient(e)
        }
    }

    async fn complete_once(&self, request: &ChatRequest) -> Result<String> {
        let body = WireRequest::from_request(request, false);
        let response = self.send(&body, Some(self.timeout)).await?;

        let parsed: CompletionResponse = response.json().await.map_err(|e| AppError::Llm {
            message: format!("Failed to parse completion: {}", e),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Llm {
                message: "Completion contained no content".to_string(),
            })
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        tracing::debug!(model = %request.model, "Requesting completion");
        with_retry("llm", self.max_retries, || self.complete_once(request)).await
    }

    async fn stream(&self, request: &ChatRequest) -> Result<TokenStream> {
        tracing::debug!(model = %request.model, "Opening completion stream");

        // No whole-request timeout here: it would cut off long answers
        let body = WireRequest::from_request(request, true);
        let response = self.send(&body, None).await?;

        let mut decoder = SseDecoder::default();
        let stream = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .into_iter()
                    .filter_map(|data| parse_stream_data(&data).transpose())
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(AppError::Llm {
                    message: format!("Stream error: {}", e),
                })],
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(stream))
    }
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// characters split across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed raw bytes and return the payloads of every completed `data:` line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

/// Extract the text delta from one SSE payload. `[DONE]` and role-only
/// deltas yield nothing.
fn parse_stream_data(data: &str) -> Result<Option<String>> {
    if data == "[DONE]" {
        return Ok(None);
    }

    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| AppError::Llm {
        message: format!("Failed to parse stream chunk: {}", e),
    })?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

//! Chat-completion abstraction
//!
//! One trait covers both call shapes the pipeline needs: a buffered
//! completion for auxiliary prompts (query expansion, follow-ups, titles)
//! and a token stream for the cited answer.

mod mock;
mod openai;

pub use mock::ScriptedChatClient;
pub use openai::{OpenAIChatClient, SseDecoder};

use crate::config::LlmConfig;
use crate::errors::Result;
use crate::models::{ConversationTurn, Role};
use async_trait::async_trait;
use futures::Stream;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

/// One message in a chat prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier (e.g., "gpt-4o")
    pub model: String,

    /// Prompt messages, system first
    pub messages: Vec<ChatMessage>,

    /// Temperature for sampling
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Incremental answer text, in arrival order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Trait for chat-completion providers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Provider name (e.g., "openai", "mock")
    fn provider_name(&self) -> &str;

    /// Perform a buffered completion and return the generated text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Open a streaming completion.
    ///
    /// Errors opening the stream are returned here; errors while reading it
    /// arrive as stream items.
    async fn stream(&self, request: &ChatRequest) -> Result<TokenStream>;
}

/// Remove a leading list marker (`1.`, `2)`, `-`, `•`) from one line of a
/// model's list output.
pub fn strip_list_marker(line: &str) -> Cow<'_, str> {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER
        .get_or_init(|| Regex::new(r"^\s*(?:\(?\d+[.):]\s*|[-*•·]\s+)").expect("list marker pattern is valid"))
        .replace(line, "")
}

/// Create a chat client based on configuration
pub fn create_chat_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChatClient::new(config)?)),
        "mock" => Ok(Arc::new(ScriptedChatClient::new())),
        other => {
            tracing::warn!(provider = other, "Unknown chat provider, using mock");
            Ok(Arc::new(ScriptedChatClient::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ChatRequest::new("gpt-4o-mini", vec![ChatMessage::user("hi")])
            .with_temperature(0.7)
            .with_max_tokens(100);
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(100));
        assert_eq!(request.messages[0].role, Role::User);
    }

    #[test]
    fn test_history_turn_converts() {
        let turn = ConversationTurn::new(Role::Assistant, "previous answer");
        let message = ChatMessage::from(&turn);
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "previous answer");
    }

    #[test]
    fn test_strip_list_marker() {
        assert_eq!(strip_list_marker("1. 고양이 구토 원인"), "고양이 구토 원인");
        assert_eq!(strip_list_marker("(2) Dose?"), "Dose?");
        assert_eq!(strip_list_marker("3) Dose?"), "Dose?");
        assert_eq!(strip_list_marker("- Dose?"), "Dose?");
        assert_eq!(strip_list_marker("• Dose?"), "Dose?");
        assert_eq!(strip_list_marker("Dose for cats?"), "Dose for cats?");
    }

    #[test]
    fn test_factory_defaults_to_mock() {
        let client = create_chat_client(&LlmConfig::default()).unwrap();
        assert_eq!(client.provider_name(), "mock");
    }
}

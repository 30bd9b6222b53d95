//! Conversation titles
//!
//! Titles come from the auxiliary model in the language of the first message.
//! Generation never fails: any provider error falls back to a prefix of the
//! message itself.

use citeforge_common::config::{AnswerConfig, LlmConfig};
use citeforge_common::language::{Language, Message};
use citeforge_common::llm::{ChatClient, ChatMessage, ChatRequest};
use std::sync::Arc;

const TITLE_MAX_TOKENS: u32 = 100;
const FALLBACK_CHARS: usize = 100;

pub struct TitleSynthesizer {
    chat: Arc<dyn ChatClient>,
    model: String,
    temperature: f32,
    domain: String,
}

impl TitleSynthesizer {
    pub fn new(chat: Arc<dyn ChatClient>, llm: &LlmConfig, answer: &AnswerConfig) -> Self {
        Self {
            chat,
            model: llm.auxiliary_model.clone(),
            temperature: llm.auxiliary_temperature,
            domain: answer.domain.clone(),
        }
    }

    pub async fn generate(&self, first_message: &str) -> String {
        if first_message.trim().is_empty() {
            return Language::Korean.message(Message::NewConversation).to_string();
        }

        let language = Language::detect(first_message);
        let messages = match language {
            Language::Korean => vec![
                ChatMessage::system(format!(
                    "당신은 {} 관련 대화의 제목을 생성하는 AI입니다. 사용자의 질문을 보고 명확한 제목을 한국어로 생성하세요. \
                     제목은 100자 이내로 작성하고, 핵심 키워드를 포함해야 합니다. 따옴표 없이 제목만 반환하세요.",
                    self.domain
                )),
                ChatMessage::user(format!(
                    "다음 질문에 대한 명확한 제목을 생성해주세요 (100자 이내, 따옴표 없이):\n\n{}",
                    first_message
                )),
            ],
            Language::English => vec![
                ChatMessage::system(format!(
                    "You are an AI that generates titles for {} conversations. Generate a clear and \
                     descriptive title in English based on the user's question. Keep it under 150 \
                     characters and include key keywords. Return ONLY the title without any quotation marks.",
                    self.domain
                )),
                ChatMessage::user(format!(
                    "Generate a clear and descriptive title for the following question \
                     (under 150 characters, without quotation marks):\n\n{}",
                    first_message
                )),
            ],
        };

        let request = ChatRequest::new(&self.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(TITLE_MAX_TOKENS);

        match self.chat.complete(&request).await {
            Ok(text) => {
                let text = text.trim();
                let title = if text.is_empty() {
                    first_message.chars().take(FALLBACK_CHARS).collect()
                } else {
                    strip_quotes(text).to_string()
                };
                tracing::info!(language = language.name(), "Title generated");
                title
            }
            Err(e) => {
                tracing::warn!(error = %e, "Title generation failed, using message prefix");
                fallback_title(first_message)
            }
        }
    }
}

/// Remove one leading and one trailing quote character.
fn strip_quotes(title: &str) -> &str {
    let title = title.strip_prefix(['"', '\'']).unwrap_or(title);
    title.strip_suffix(['"', '\'']).unwrap_or(title)
}

/// First 100 characters of the message, with `...` when truncated.
pub fn fallback_title(message: &str) -> String {
    let mut title: String = message.chars().take(FALLBACK_CHARS).collect();
    if message.chars().count() > FALLBACK_CHARS {
        title.push_str("...");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeforge_common::llm::ScriptedChatClient;

    fn synthesizer(chat: Arc<ScriptedChatClient>) -> TitleSynthesizer {
        TitleSynthesizer::new(chat, &LlmConfig::default(), &AnswerConfig::default())
    }

    #[tokio::test]
    async fn test_blank_message_gets_default_title() {
        let chat = Arc::new(ScriptedChatClient::new().with_recording());
        let title = synthesizer(chat.clone()).generate("   ").await;
        assert_eq!(title, "새 대화");
        assert!(chat.requests().is_empty());
    }

    #[tokio::test]
    async fn test_quotes_are_stripped_and_language_follows_message() {
        let chat = Arc::new(ScriptedChatClient::new().with_recording().with_completion("\"고양이 만성 신장병 치료\""));
        let title = synthesizer(chat.clone()).generate("고양이 CKD 치료법은?").await;

        assert_eq!(title, "고양이 만성 신장병 치료");
        let request = &chat.requests()[0];
        assert!(request.messages[0].content.contains("한국어"));
        assert_eq!(request.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_prefix() {
        let long = "a".repeat(150);
        let chat = Arc::new(ScriptedChatClient::new().with_completion_error("timeout"));
        let title = synthesizer(chat).generate(&long).await;
        assert_eq!(title, format!("{}...", "a".repeat(100)));

        let chat = Arc::new(ScriptedChatClient::new().with_completion_error("timeout"));
        assert_eq!(synthesizer(chat).generate("Short question").await, "Short question");
    }

    #[tokio::test]
    async fn test_empty_completion_uses_prefix_without_ellipsis() {
        let long = "b".repeat(120);
        let chat = Arc::new(ScriptedChatClient::new().with_completion("  "));
        assert_eq!(synthesizer(chat).generate(&long).await, "b".repeat(100));
    }
}

//! Follow-up question generation

use crate::citation::strip_markers;
use citeforge_common::config::{AnswerConfig, LlmConfig};
use citeforge_common::language::Language;
use citeforge_common::llm::{strip_list_marker, ChatClient, ChatMessage, ChatRequest};
use citeforge_common::models::ConversationTurn;
use std::sync::Arc;

/// Questions returned per answer
pub const FOLLOWUP_COUNT: usize = 3;

const FOLLOWUP_MAX_TOKENS: u32 = 300;
const HISTORY_SUMMARY_TURNS: usize = 4;
const HISTORY_SUMMARY_CHARS: usize = 200;

/// Suggests the next questions a clinician would ask. Best-effort: failures
/// yield an empty list.
pub struct FollowupSynthesizer {
    chat: Arc<dyn ChatClient>,
    model: String,
    temperature: f32,
    domain: String,
    answer_chars: usize,
}

impl FollowupSynthesizer {
    pub fn new(chat: Arc<dyn ChatClient>, llm: &LlmConfig, answer: &AnswerConfig) -> Self {
        Self {
            chat,
            model: llm.auxiliary_model.clone(),
            temperature: llm.auxiliary_temperature,
            domain: answer.domain.clone(),
            answer_chars: answer.followup_answer_chars,
        }
    }

    pub async fn generate(
        &self,
        question: &str,
        answer: &str,
        history: &[ConversationTurn],
        language: Language,
    ) -> Vec<String> {
        let prompt = self.prompt(question, answer, history, language);
        let request = ChatRequest::new(&self.model, vec![ChatMessage::user(prompt)])
            .with_temperature(self.temperature)
            .with_max_tokens(FOLLOWUP_MAX_TOKENS);

        match self.chat.complete(&request).await {
            Ok(text) => {
                let questions = parse_questions(&text);
                tracing::info!(count = questions.len(), language = language.name(), "Follow-up questions generated");
                questions
            }
            Err(e) => {
                tracing::warn!(error = %e, "Follow-up generation failed");
                Vec::new()
            }
        }
    }

    fn prompt(&self, question: &str, answer: &str, history: &[ConversationTurn], language: Language) -> String {
        let excerpt: String = strip_markers(answer).chars().take(self.answer_chars).collect();

        let recent = history.len().saturating_sub(HISTORY_SUMMARY_TURNS);
        let summary = history[recent..]
            .iter()
            .map(|turn| {
                let content: String = turn.content.chars().take(HISTORY_SUMMARY_CHARS).collect();
                format!("{}: {}", turn.role.as_str(), content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut prompt = format!(
            "Based on this {domain} Q&A, generate {count} SPECIFIC follow-up questions in {language}.\n\n",
            domain = self.domain,
            count = FOLLOWUP_COUNT,
            language = language.name(),
        );
        if !summary.is_empty() {
            prompt.push_str(&format!("Earlier conversation:\n{}\n\n", summary));
        }
        prompt.push_str(&format!(
            "Question: {question}\n\
             Answer: {excerpt}...\n\n\
             The follow-up questions must be:\n\
             1. Specific to the clinical details in the answer (medications, procedures, findings)\n\
             2. Directly related to the case discussed\n\
             3. Natural next questions a practitioner would ask\n\n\
             Avoid generic questions such as \"What other treatments are available?\".\n\
             Return only the questions, one per line, without numbering or bullet points."
        ));
        prompt
    }
}

/// One question per non-blank line, list markers removed, at most
/// [`FOLLOWUP_COUNT`].
pub fn parse_questions(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| strip_list_marker(line).trim().to_string())
        .filter(|line| !line.is_empty())
        .take(FOLLOWUP_COUNT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeforge_common::llm::ScriptedChatClient;
    use citeforge_common::models::Role;

    fn synthesizer(chat: Arc<ScriptedChatClient>) -> FollowupSynthesizer {
        FollowupSynthesizer::new(chat, &LlmConfig::default(), &AnswerConfig::default())
    }

    #[test]
    fn test_parse_strips_numbering_and_caps() {
        let questions = parse_questions("1. First?\n\n2) Second?\n- Third?\n4. Fourth?");
        assert_eq!(questions, vec!["First?", "Second?", "Third?"]);
    }

    #[tokio::test]
    async fn test_prompt_uses_clean_bounded_answer() {
        let chat = Arc::new(ScriptedChatClient::new().with_recording().with_completion("What dose for a 5kg cat?"));
        let answer = format!("Use maropitant.{{{{citation:0}}}} {}", "가".repeat(1000));
        let history = vec![ConversationTurn::new(Role::User, "Cat vomiting")];

        let questions = synthesizer(chat.clone())
            .generate("How to treat?", &answer, &history, Language::English)
            .await;

        assert_eq!(questions, vec!["What dose for a 5kg cat?"]);

        let prompt = &chat.requests()[0].messages[0].content;
        assert!(!prompt.contains("{{citation"));
        assert!(prompt.contains("user: Cat vomiting"));
        assert_eq!(prompt.matches('가').count(), 800 - "Use maropitant. ".chars().count());
    }

    #[tokio::test]
    async fn test_failure_yields_empty_list() {
        let chat = Arc::new(ScriptedChatClient::new().with_completion_error("rate limited"));
        let questions = synthesizer(chat)
            .generate("q", "a", &[], Language::Korean)
            .await;
        assert!(questions.is_empty());
    }
}

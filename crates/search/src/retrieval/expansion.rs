//! Query expansion
//!
//! Asks the auxiliary model for alternative phrasings of the question so the
//! index is probed from more than one angle. Best-effort: any failure leaves
//! the original question as the only query.

use citeforge_common::language::Language;
use citeforge_common::llm::{strip_list_marker, ChatClient, ChatMessage, ChatRequest};
use std::sync::Arc;

/// Generates alternative phrasings with the auxiliary model
pub struct QueryExpander {
    chat: Arc<dyn ChatClient>,
    model: String,
    temperature: f32,
    max_queries: usize,
}

const EXPANSION_MAX_TOKENS: u32 = 100;

impl QueryExpander {
    pub fn new(chat: Arc<dyn ChatClient>, model: impl Into<String>, temperature: f32, max_queries: usize) -> Self {
        Self {
            chat,
            model: model.into(),
            temperature,
            max_queries: max_queries.max(1),
        }
    }

    /// Return the query set: the original question first, then up to
    /// `max_queries - 1` alternatives.
    pub async fn expand(&self, question: &str, language: Language) -> Vec<String> {
        let alternatives = self.max_queries - 1;
        if alternatives == 0 {
            return vec![question.to_string()];
        }

        let prompt = format!(
            "Generate {} alternative phrasings of this question in {}:\n\n\
             Original: {}\n\n\
             Return only the alternative questions, one per line.",
            alternatives,
            language.name(),
            question
        );

        let request = ChatRequest::new(&self.model, vec![ChatMessage::user(prompt)])
            .with_temperature(self.temperature)
            .with_max_tokens(EXPANSION_MAX_TOKENS);

        match self.chat.complete(&request).await {
            Ok(text) => parse_alternatives(question, &text, self.max_queries),
            Err(e) => {
                tracing::warn!(error = %e, "Query expansion failed, using original question only");
                vec![question.to_string()]
            }
        }
    }
}

/// Build the query set from the model's line-per-phrasing output.
pub fn parse_alternatives(question: &str, text: &str, max_queries: usize) -> Vec<String> {
    let mut queries = vec![question.to_string()];
    let original = question.trim().to_lowercase();

    for line in text.lines() {
        if queries.len() >= max_queries {
            break;
        }
        let cleaned = strip_list_marker(line);
        let cleaned = cleaned.trim().trim_matches('"').trim();
        if cleaned.is_empty() || cleaned.to_lowercase() == original {
            continue;
        }
        if queries.iter().any(|q| q.eq_ignore_ascii_case(cleaned)) {
            continue;
        }
        queries.push(cleaned.to_string());
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeforge_common::llm::ScriptedChatClient;

    #[test]
    fn test_numbering_and_blanks_are_stripped() {
        let queries = parse_alternatives(
            "How is feline CKD staged?",
            "1. What are the IRIS stages of CKD in cats?\n\n2) Feline chronic kidney disease staging criteria\n",
            3,
        );
        assert_eq!(
            queries,
            vec![
                "How is feline CKD staged?",
                "What are the IRIS stages of CKD in cats?",
                "Feline chronic kidney disease staging criteria",
            ]
        );
    }

    #[test]
    fn test_original_is_not_repeated_and_set_is_bounded() {
        let queries = parse_alternatives(
            "Dose of maropitant?",
            "- dose of maropitant?\n- Maropitant dosing in dogs\n- Cerenia dose\n- Extra line",
            3,
        );
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[1], "Maropitant dosing in dogs");
        assert_eq!(queries[2], "Cerenia dose");
    }

    #[test]
    fn test_plain_numbers_in_text_survive() {
        let queries = parse_alternatives("q", "2024 guidelines for canine parvovirus", 3);
        assert_eq!(queries[1], "2024 guidelines for canine parvovirus");
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_original() {
        let chat = Arc::new(ScriptedChatClient::new().with_completion_error("rate limited"));
        let expander = QueryExpander::new(chat, "gpt-4o-mini", 0.7, 3);

        let queries = expander.expand("고양이 신부전 단계는?", Language::Korean).await;
        assert_eq!(queries, vec!["고양이 신부전 단계는?"]);
    }

    #[tokio::test]
    async fn test_prompt_names_language() {
        let chat = Arc::new(ScriptedChatClient::new().with_recording().with_completion("대안 질문"));
        let expander = QueryExpander::new(chat.clone(), "gpt-4o-mini", 0.7, 3);

        let queries = expander.expand("고양이 신부전 단계는?", Language::Korean).await;
        assert_eq!(queries.len(), 2);

        let request = &chat.requests()[0];
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.max_tokens, Some(100));
        assert!(request.messages[0].content.contains("in Korean"));
    }
}

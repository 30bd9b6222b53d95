//! Answer prompt construction

use crate::citation::DocumentGroups;
use citeforge_common::language::Language;
use citeforge_common::llm::ChatMessage;
use citeforge_common::models::ConversationTurn;

/// Answer the model must give when the documents cannot answer the question.
pub const OUT_OF_SCOPE_SENTINEL: &str = "OUT_OF_SCOPE_QUERY";

/// Builds the system and user messages for a cited answer.
#[derive(Debug, Clone)]
pub struct AnswerPrompt<'a> {
    pub domain: &'a str,
    pub language: Language,
    pub history_turns: usize,
}

impl AnswerPrompt<'_> {
    pub fn system_prompt(&self, num_documents: usize) -> String {
        let last = num_documents.saturating_sub(1);
        format!(
            "You are an evidence-based citation engine for {domain}.\n\
             Answer only from the provided documents, staying close to their wording. \
             Keep exact drug names, dosages, routes, frequencies, durations and study figures. \
             Do not add information that the documents do not state.\n\
             \n\
             FOLLOW-UP QUESTIONS\n\
             When the conversation already covered a topic, go deeper rather than repeating \
             the previous answer: add mechanisms, specifics and examples from the documents.\n\
             \n\
             OUT OF SCOPE\n\
             If the question is completely outside the scope of the documents, respond with \
             exactly: {sentinel}\n\
             \n\
             CITATIONS\n\
             1. Cite with {{{{citation:N}}}} where N is the 0-based document index.\n\
             2. You have exactly {n} documents: indices 0 to {last}. Citations of any other \
             index are invalid and will be removed.\n\
             3. Cite several documents as {{{{citation:0,1,2}}}}, without spaces.\n\
             4. Every clinical claim needs a citation; place it at the end of the paragraph.\n\
             5. Put sentence punctuation before the citation: \"A sentence.{{{{citation:0}}}}\".\n\
             \n\
             FORMAT\n\
             Write 3-5 substantive paragraphs for experienced clinicians, each ending with its \
             citations. Use **bold** for key clinical points and markdown tables when comparing \
             options. Write in {language}.\n\
             \n\
             Available documents: 0 to {last}",
            domain = self.domain,
            sentinel = OUT_OF_SCOPE_SENTINEL,
            n = num_documents,
            last = last,
            language = self.language.name(),
        )
    }

    /// Context block: one `Document g` entry per group, holding the text of
    /// every chunk in the group.
    pub fn context_block(groups: &DocumentGroups) -> String {
        groups
            .iter()
            .enumerate()
            .map(|(index, chunks)| {
                let title = chunks.first().map(|c| c.title.as_str()).unwrap_or_default();
                let body = chunks
                    .iter()
                    .map(|c| c.text.trim())
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("Document {} ({}):\n{}", index, title, body)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Full message list: system prompt, recent history, then the question
    /// with its evidence.
    pub fn messages(
        &self,
        question: &str,
        groups: &DocumentGroups,
        history: &[ConversationTurn],
    ) -> Vec<ChatMessage> {
        let n = groups.len();
        let mut messages = Vec::with_capacity(self.history_turns + 2);
        messages.push(ChatMessage::system(self.system_prompt(n)));

        let recent = history.len().saturating_sub(self.history_turns);
        messages.extend(history[recent..].iter().map(ChatMessage::from));

        messages.push(ChatMessage::user(format!(
            "Question: {}\n\nContext (Documents 0-{}):\n{}\n\n\
             Provide a detailed clinical answer in {} following the rules above.",
            question,
            n.saturating_sub(1),
            Self::context_block(groups),
            self.language.name(),
        )));

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeforge_common::models::{ChunkRecord, EvidenceChunk, Role};

    fn chunk(title: &str, text: &str) -> EvidenceChunk {
        EvidenceChunk::from(ChunkRecord {
            source: Some("KSVM".to_string()),
            title: Some(title.to_string()),
            text: Some(text.to_string()),
            ..ChunkRecord::default()
        })
    }

    fn prompt() -> AnswerPrompt<'static> {
        AnswerPrompt {
            domain: "veterinary medicine",
            language: Language::Korean,
            history_turns: 6,
        }
    }

    #[test]
    fn test_documents_are_groups_not_chunks() {
        let groups = DocumentGroups::from_chunks(&[
            chunk("CKD", "first part"),
            chunk("Vomiting", "other"),
            chunk("CKD", "second part"),
        ]);

        let context = AnswerPrompt::context_block(&groups);
        assert!(context.contains("Document 0 (CKD):\nfirst part\nsecond part"));
        assert!(context.contains("Document 1 (Vomiting):\nother"));
        assert!(!context.contains("Document 2"));
    }

    #[test]
    fn test_system_prompt_states_range_and_sentinel() {
        let system = prompt().system_prompt(4);
        assert!(system.contains("exactly 4 documents: indices 0 to 3"));
        assert!(system.contains(OUT_OF_SCOPE_SENTINEL));
        assert!(system.contains("{{citation:N}}"));
        assert!(system.contains("Write in Korean"));
        assert!(system.contains("veterinary medicine"));
    }

    #[test]
    fn test_only_recent_history_is_forwarded() {
        let groups = DocumentGroups::from_chunks(&[chunk("CKD", "t")]);
        let history: Vec<_> = (0..10)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                ConversationTurn::new(role, format!("turn {}", i))
            })
            .collect();

        let messages = prompt().messages("질문", &groups, &history);

        assert_eq!(messages.len(), 8);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "turn 4");
        assert_eq!(messages[7].role, Role::User);
        assert!(messages[7].content.starts_with("Question: 질문"));
    }
}

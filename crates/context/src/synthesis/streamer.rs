//! Answer streaming
//!
//! Drives the chat token stream through the citation tokenizer and relays
//! every cleaned fragment to the client as a `streaming` event. Provider
//! failures never escape: the localized fallback sentence becomes the answer.

use super::prompt::OUT_OF_SCOPE_SENTINEL;
use crate::citation::CitationTokenizer;
use citeforge_common::config::LlmConfig;
use citeforge_common::language::{Language, Message};
use citeforge_common::llm::{ChatClient, ChatMessage, ChatRequest};
use citeforge_common::metrics;
use citeforge_common::models::StreamEvent;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// How an answer stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The model finished normally
    Completed,
    /// The model answered with the out-of-scope sentinel
    OutOfScope,
    /// The provider failed; the answer is the fallback sentence
    Recovered,
    /// The client went away mid-stream
    Disconnected,
}

impl AnswerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerOutcome::Completed => "completed",
            AnswerOutcome::OutOfScope => "out_of_scope",
            AnswerOutcome::Recovered => "recovered",
            AnswerOutcome::Disconnected => "disconnected",
        }
    }
}

/// Full cleaned answer and how it ended
#[derive(Debug, Clone, PartialEq)]
pub struct StreamedAnswer {
    pub answer: String,
    pub outcome: AnswerOutcome,
    pub fragments: usize,
}

/// Streams one cited answer to the client.
pub struct AnswerStreamer {
    chat: Arc<dyn ChatClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    typing_delay: Duration,
}

impl AnswerStreamer {
    pub fn new(chat: Arc<dyn ChatClient>, llm: &LlmConfig, typing_delay: Duration) -> Self {
        Self {
            chat,
            model: llm.answer_model.clone(),
            temperature: llm.answer_temperature,
            max_tokens: llm.answer_max_tokens,
            typing_delay,
        }
    }

    /// Stream the answer to `messages`, validating citations against
    /// `num_documents`.
    pub async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        num_documents: usize,
        language: Language,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> StreamedAnswer {
        let started = Instant::now();
        let request = ChatRequest::new(&self.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let mut tokens = match self.chat.stream(&request).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::error!(error = %e, provider = self.chat.provider_name(), "Answer stream failed to open");
                return self.recover(language, tx, started).await;
            }
        };

        let mut tokenizer = CitationTokenizer::new(num_documents);
        let mut answer = String::new();
        let mut fragments = 0;

        while let Some(item) = tokens.next().await {
            let token = match item {
                Ok(token) => token,
                Err(e) => {
                    tracing::error!(error = %e, fragments, "Answer stream failed mid-read");
                    return self.recover(language, tx, started).await;
                }
            };

            let clean = tokenizer.push(&token);
            if clean.is_empty() {
                continue;
            }
            if !self.relay(&clean, tx).await {
                return finish(answer, AnswerOutcome::Disconnected, fragments, started);
            }
            answer.push_str(&clean);
            fragments += 1;
        }

        let tail = tokenizer.finish();
        if !tail.is_empty() {
            if !self.relay(&tail, tx).await {
                return finish(answer, AnswerOutcome::Disconnected, fragments, started);
            }
            answer.push_str(&tail);
            fragments += 1;
        }

        metrics::record_dropped_citations(tokenizer.dropped().len());

        let outcome = if answer.contains(OUT_OF_SCOPE_SENTINEL) {
            AnswerOutcome::OutOfScope
        } else {
            AnswerOutcome::Completed
        };

        finish(answer, outcome, fragments, started)
    }

    /// Send one fragment, then pause for the typing effect. Returns false once
    /// the receiver is gone.
    async fn relay(&self, chunk: &str, tx: &mpsc::Sender<StreamEvent>) -> bool {
        let event = StreamEvent::Streaming {
            chunk: chunk.to_string(),
        };
        if tx.send(event).await.is_err() {
            tracing::info!("Client disconnected during answer stream");
            return false;
        }
        if !self.typing_delay.is_zero() {
            tokio::time::sleep(self.typing_delay).await;
        }
        true
    }

    async fn recover(&self, language: Language, tx: &mpsc::Sender<StreamEvent>, started: Instant) -> StreamedAnswer {
        let fallback = language.message(Message::AnswerFailed).to_string();
        if !self.relay(&fallback, tx).await {
            return finish(String::new(), AnswerOutcome::Disconnected, 0, started);
        }
        finish(fallback, AnswerOutcome::Recovered, 1, started)
    }
}

fn finish(answer: String, outcome: AnswerOutcome, fragments: usize, started: Instant) -> StreamedAnswer {
    metrics::record_answer(started.elapsed().as_secs_f64(), fragments, outcome.as_str());
    tracing::info!(
        outcome = outcome.as_str(),
        fragments,
        chars = answer.chars().count(),
        "Answer stream finished"
    );
    StreamedAnswer {
        answer,
        outcome,
        fragments,
    }
}

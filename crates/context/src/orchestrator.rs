//! Per-request answer lifecycle
//!
//! Sequences retrieval, streaming, remapping and follow-ups, and emits the
//! event protocol in order:
//!
//! ```text
//! translating -> embedding -> searching -> error
//!                                       -> generating -> streaming* -> out_of_scope
//!                                                                   -> references_ready -> done -> followup_ready?
//! ```
//!
//! Events go to a bounded channel drained by the HTTP layer. A failed send
//! means the client is gone; the orchestrator stops at that point.

use crate::citation::{DocumentGroups, ReferenceRemapper};
use crate::synthesis::{AnswerOutcome, AnswerPrompt, AnswerStreamer, FollowupSynthesizer};
use citeforge_common::config::AppConfig;
use citeforge_common::embeddings::Embedder;
use citeforge_common::index::VectorIndex;
use citeforge_common::language::{Language, Message};
use citeforge_common::llm::ChatClient;
use citeforge_common::models::{ConversationTurn, EvidenceChunk, StreamEvent};
use citeforge_common::reference_data::ReferenceDirectory;
use citeforge_search::EvidenceFuser;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One question with its caller-supplied context
#[derive(Debug, Clone, Default)]
pub struct AnswerRequest {
    pub question: String,
    pub history: Vec<ConversationTurn>,
    /// Evidence returned by the previous turn's `done` event
    pub carried: Vec<EvidenceChunk>,
    pub language_hint: Option<String>,
}

impl AnswerRequest {
    /// Answer language. The question's script decides; the hint only applies
    /// when the question has no letters at all.
    pub fn language(&self) -> Language {
        if self.question.chars().any(char::is_alphabetic) {
            return Language::detect(&self.question);
        }
        self.language_hint
            .as_deref()
            .and_then(Language::from_hint)
            .unwrap_or(Language::Korean)
    }
}

/// The receiver was dropped.
struct Disconnected;

pub struct ConversationOrchestrator {
    fuser: EvidenceFuser,
    streamer: AnswerStreamer,
    remapper: ReferenceRemapper,
    followups: FollowupSynthesizer,
    domain: String,
    history_turns: usize,
}

impl ConversationOrchestrator {
    pub fn new(
        fuser: EvidenceFuser,
        streamer: AnswerStreamer,
        remapper: ReferenceRemapper,
        followups: FollowupSynthesizer,
        domain: impl Into<String>,
        history_turns: usize,
    ) -> Self {
        Self {
            fuser,
            streamer,
            remapper,
            followups,
            domain: domain.into(),
            history_turns,
        }
    }

    /// Wire every component from shared providers and configuration.
    pub fn from_providers(
        chat: Arc<dyn ChatClient>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        directory: Arc<ReferenceDirectory>,
        config: &AppConfig,
    ) -> Self {
        Self::new(
            EvidenceFuser::new(chat.clone(), embedder, index, &config.llm, &config.retrieval),
            AnswerStreamer::new(chat.clone(), &config.llm, config.typing_delay()),
            ReferenceRemapper::new(directory),
            FollowupSynthesizer::new(chat, &config.llm, &config.answer),
            config.answer.domain.clone(),
            config.answer.history_turns,
        )
    }

    /// Answer one question, emitting protocol events into `tx`.
    ///
    /// Returns the terminal status: `done`, `out_of_scope`, `error` or
    /// `disconnected`.
    pub async fn run(&self, request: AnswerRequest, tx: mpsc::Sender<StreamEvent>) -> &'static str {
        match self.drive(&request, &tx).await {
            Ok(status) => status,
            Err(Disconnected) => {
                tracing::info!("Client disconnected, abandoning request");
                "disconnected"
            }
        }
    }

    async fn drive(&self, request: &AnswerRequest, tx: &mpsc::Sender<StreamEvent>) -> Result<&'static str, Disconnected> {
        let language = request.language();
        tracing::info!(
            language = language.name(),
            history = request.history.len(),
            carried = request.carried.len(),
            "Answering question"
        );

        emit(tx, StreamEvent::Translating {
            message: language.message(Message::Translating).to_string(),
        })
        .await?;

        emit(tx, StreamEvent::Embedding {
            message: language.message(Message::Embedding).to_string(),
        })
        .await?;
        let embedded = self.fuser.embed_queries(&request.question, language).await;

        emit(tx, StreamEvent::Searching {
            message: language.message(Message::Searching).to_string(),
        })
        .await?;
        let evidence = self.fuser.search_and_merge(embedded, &request.carried).await;

        if evidence.is_empty() {
            let message = if evidence.degradation.is_outage() {
                tracing::error!(degradation = ?evidence.degradation, "Every upstream retrieval call failed");
                Message::ServiceError
            } else {
                tracing::info!("No evidence found");
                Message::NoEvidence
            };
            emit(tx, StreamEvent::Error {
                message: language.message(message).to_string(),
            })
            .await?;
            return Ok("error");
        }

        emit(tx, StreamEvent::Generating {
            message: language.message(Message::Generating).to_string(),
        })
        .await?;

        let groups = DocumentGroups::from_chunks(&evidence.chunks);
        let prompt = AnswerPrompt {
            domain: &self.domain,
            language,
            history_turns: self.history_turns,
        };
        let messages = prompt.messages(&request.question, &groups, &request.history);

        let streamed = self.streamer.stream(messages, groups.len(), language, tx).await;

        match streamed.outcome {
            AnswerOutcome::Disconnected => return Err(Disconnected),
            AnswerOutcome::OutOfScope => {
                emit(tx, StreamEvent::OutOfScope {
                    message: language.message(Message::OutOfScope).to_string(),
                })
                .await?;
                return Ok("out_of_scope");
            }
            AnswerOutcome::Completed | AnswerOutcome::Recovered => {}
        }

        // No follow-ups for the fallback sentence
        let followups = async {
            if streamed.outcome == AnswerOutcome::Recovered {
                return Vec::new();
            }
            self.followups
                .generate(&request.question, &streamed.answer, &request.history, language)
                .await
        };
        let remap = async { self.remapper.remap(&streamed.answer, &groups) };
        let (remapped, questions) = tokio::join!(remap, followups);

        emit(tx, StreamEvent::ReferencesReady {
            answer: remapped.answer,
            references: remapped.references,
        })
        .await?;

        emit(tx, StreamEvent::Done {
            message: language.message(Message::Done).to_string(),
            context_chunks: evidence.chunks,
        })
        .await?;

        if !questions.is_empty() {
            emit(tx, StreamEvent::FollowupReady {
                followup_questions: questions,
            })
            .await?;
        }

        Ok("done")
    }
}

async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> Result<(), Disconnected> {
    tracing::debug!(status = event.status(), "Emitting event");
    tx.send(event).await.map_err(|_| Disconnected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use citeforge_common::errors::{AppError, Result};
    use citeforge_common::embeddings::MockEmbedder;
    use citeforge_common::index::InMemoryIndex;
    use citeforge_common::llm::ScriptedChatClient;
    use citeforge_common::models::ChunkRecord;

    const DIMENSION: usize = 8;

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AppError::ServiceUnavailable {
                message: "embedding quota exhausted".into(),
            })
        }

        fn model_name(&self) -> &str {
            "down"
        }

        fn dimension(&self) -> usize {
            DIMENSION
        }
    }

    fn chunk(id: &str, title: &str, page: i64) -> EvidenceChunk {
        EvidenceChunk::from(ChunkRecord {
            chunk_id: Some(id.to_string()),
            text: Some(format!("Passage {}", id)),
            source: Some("KSVM".to_string()),
            title: Some(title.to_string()),
            page: Some(page),
            pmid: Some(format!("1000{}", page)),
            ..ChunkRecord::default()
        })
    }

    fn index_with(chunks: Vec<EvidenceChunk>) -> Arc<InMemoryIndex> {
        let index = InMemoryIndex::new(DIMENSION);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut vector = vec![0.1; DIMENSION];
            vector[i % DIMENSION] = 1.0;
            index.insert(vector, chunk).unwrap();
        }
        Arc::new(index)
    }

    fn orchestrator(
        chat: ScriptedChatClient,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> ConversationOrchestrator {
        let mut config = AppConfig::default();
        config.answer.typing_delay_ms = 0;
        ConversationOrchestrator::from_providers(
            Arc::new(chat),
            embedder,
            index,
            Arc::new(ReferenceDirectory::default()),
            &config,
        )
    }

    fn request(question: &str) -> AnswerRequest {
        AnswerRequest {
            question: question.to_string(),
            ..AnswerRequest::default()
        }
    }

    async fn collect(orchestrator: &ConversationOrchestrator, request: AnswerRequest) -> (Vec<StreamEvent>, &'static str) {
        let (tx, mut rx) = mpsc::channel(64);
        let status = orchestrator.run(request, tx).await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (events, status)
    }

    fn statuses(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(StreamEvent::status).collect()
    }

    #[tokio::test]
    async fn test_full_answer_event_order() {
        let chat = ScriptedChatClient::new()
            .with_completion("")
            .with_stream(["Fluids help.{{cita", "tion:1}} Diet too.{{citation:1,0,9}}"])
            .with_completion("1. Which fluid rate?\n2. Which diet?");
        let index = index_with(vec![chunk("a", "IRIS", 1), chunk("b", "ACVIM", 2)]);
        let orchestrator = orchestrator(chat, Arc::new(MockEmbedder::new(DIMENSION)), index);

        let (events, status) = collect(&orchestrator, request("How is CKD managed?")).await;

        assert_eq!(status, "done");
        assert_eq!(
            statuses(&events),
            vec![
                "translating",
                "embedding",
                "searching",
                "generating",
                "streaming",
                "streaming",
                "references_ready",
                "done",
                "followup_ready",
            ]
        );

        let StreamEvent::ReferencesReady { answer, references } = &events[6] else {
            panic!("expected references_ready");
        };
        assert_eq!(references.len(), 2);
        assert!(answer.contains("{{citation:1,0}}"));
        assert!(!answer.contains('9'));

        let StreamEvent::Done { context_chunks, .. } = &events[7] else {
            panic!("expected done");
        };
        assert_eq!(context_chunks.len(), 2);

        let StreamEvent::FollowupReady { followup_questions } = &events[8] else {
            panic!("expected followup_ready");
        };
        assert_eq!(followup_questions, &vec!["Which fluid rate?".to_string(), "Which diet?".to_string()]);
    }

    #[tokio::test]
    async fn test_progress_messages_are_localized() {
        let index = index_with(vec![chunk("a", "IRIS", 1)]);
        let orchestrator = orchestrator(ScriptedChatClient::new(), Arc::new(MockEmbedder::new(DIMENSION)), index);

        let (events, _) = collect(&orchestrator, request("고양이 신부전 치료는?")).await;

        assert_eq!(
            events[0],
            StreamEvent::Translating {
                message: "질문 이해 중...".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_index_is_terminal_error() {
        let orchestrator = orchestrator(
            ScriptedChatClient::new(),
            Arc::new(MockEmbedder::new(DIMENSION)),
            index_with(vec![]),
        );

        let (events, status) = collect(&orchestrator, request("Anything?")).await;

        assert_eq!(status, "error");
        assert_eq!(statuses(&events), vec!["translating", "embedding", "searching", "error"]);
        assert_eq!(
            events[3],
            StreamEvent::Error {
                message: Language::English.message(Message::NoEvidence).to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_provider_outage_uses_generic_message() {
        let orchestrator = orchestrator(
            ScriptedChatClient::new(),
            Arc::new(DownEmbedder),
            index_with(vec![chunk("a", "IRIS", 1)]),
        );

        let (events, status) = collect(&orchestrator, request("Anything?")).await;

        assert_eq!(status, "error");
        let StreamEvent::Error { message } = events.last().unwrap() else {
            panic!("expected error");
        };
        assert_eq!(message, Language::English.message(Message::ServiceError));
        assert!(!message.contains("quota"));
    }

    #[tokio::test]
    async fn test_carried_evidence_survives_outage() {
        let orchestrator = orchestrator(
            ScriptedChatClient::new().with_completion("").with_stream(["Still cited.{{citation:0}}"]),
            Arc::new(DownEmbedder),
            index_with(vec![]),
        );
        let mut request = request("And the prognosis?");
        request.carried = vec![chunk("old", "IRIS", 4)];

        let (events, status) = collect(&orchestrator, request).await;

        assert_eq!(status, "done");
        assert!(statuses(&events).contains(&"references_ready"));
    }

    #[tokio::test]
    async fn test_out_of_scope_stops_before_references() {
        let chat = ScriptedChatClient::new()
            .with_completion("")
            .with_stream(["OUT_OF_SCOPE_QUERY"]);
        let orchestrator = orchestrator(
            chat,
            Arc::new(MockEmbedder::new(DIMENSION)),
            index_with(vec![chunk("a", "IRIS", 1)]),
        );

        let (events, status) = collect(&orchestrator, request("What is the capital of France?")).await;

        assert_eq!(status, "out_of_scope");
        assert_eq!(statuses(&events).last(), Some(&"out_of_scope"));
        assert!(!statuses(&events).contains(&"references_ready"));
    }

    #[tokio::test]
    async fn test_stream_failure_completes_with_fallback() {
        let chat = ScriptedChatClient::new()
            .with_completion("")
            .with_stream_open_error("upstream 503");
        let orchestrator = orchestrator(
            chat,
            Arc::new(MockEmbedder::new(DIMENSION)),
            index_with(vec![chunk("a", "IRIS", 1)]),
        );

        let (events, status) = collect(&orchestrator, request("How is CKD staged?")).await;

        assert_eq!(status, "done");
        assert_eq!(
            statuses(&events),
            vec!["translating", "embedding", "searching", "generating", "streaming", "references_ready", "done"]
        );
        let StreamEvent::ReferencesReady { answer, references } = &events[5] else {
            panic!("expected references_ready");
        };
        assert_eq!(answer, Language::English.message(Message::AnswerFailed));
        assert!(references.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_run() {
        let orchestrator = orchestrator(
            ScriptedChatClient::new(),
            Arc::new(MockEmbedder::new(DIMENSION)),
            index_with(vec![chunk("a", "IRIS", 1)]),
        );
        let (tx, rx) = mpsc::channel(64);
        drop(rx);

        assert_eq!(orchestrator.run(request("Anything?"), tx).await, "disconnected");
    }

    #[test]
    fn test_language_resolution() {
        assert_eq!(request("신장 질환").language(), Language::Korean);
        assert_eq!(request("kidney disease").language(), Language::English);

        let mut numeric = request("3.5 mg/kg?");
        assert_eq!(numeric.language(), Language::English);

        numeric.question = "???".to_string();
        assert_eq!(numeric.language(), Language::Korean);
        numeric.language_hint = Some("English".to_string());
        assert_eq!(numeric.language(), Language::English);
    }
}

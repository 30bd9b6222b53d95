//! Streaming answer handler
//!
//! Validates the request, starts the orchestrator on its own task and relays
//! its events as server-sent events, one JSON object per `data:` frame.

use axum::{
    extract::State,
    http::{header, HeaderName},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    Json,
};
use futures::stream;
use serde::Deserialize;
use std::borrow::Cow;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::AppState;
use citeforge_common::{
    errors::{AppError, Result},
    metrics::RequestMetrics,
    models::{ConversationTurn, EvidenceChunk},
};
use citeforge_context::AnswerRequest;

pub const MAX_QUESTION_CHARS: usize = 4000;
pub const MAX_HISTORY_TURNS: usize = 50;

/// Streaming query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(custom(function = "validate_question"))]
    pub question: String,

    #[serde(default)]
    #[validate(length(max = 50, message = "conversation_history holds at most 50 turns"))]
    pub conversation_history: Vec<ConversationTurn>,

    /// Evidence from the previous turn's `done` event
    #[serde(default)]
    pub previous_context_chunks: Vec<EvidenceChunk>,

    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "한국어".to_string()
}

fn validate_question(question: &str) -> std::result::Result<(), ValidationError> {
    let chars = question.trim().chars().count();
    if chars == 0 || chars > MAX_QUESTION_CHARS {
        return Err(ValidationError::new("length")
            .with_message(Cow::Borrowed("question must be 1-4000 characters")));
    }
    Ok(())
}

/// Answer a question as a server-sent event stream
pub async fn query_stream(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<impl IntoResponse> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let request_id = Uuid::new_v4();
    let answer = AnswerRequest {
        question: request.question.trim().to_string(),
        history: request.conversation_history,
        carried: request.previous_context_chunks,
        language_hint: Some(request.language),
    };

    let (tx, rx) = mpsc::channel(state.config.answer.event_buffer.max(1));
    let orchestrator = state.orchestrator.clone();

    tokio::spawn(
        async move {
            let metrics = RequestMetrics::start("query_stream");
            let status = orchestrator.run(answer, tx).await;
            tracing::info!(status, "Query stream finished");
            metrics.finish(status);
        }
        .instrument(tracing::info_span!("query_stream", %request_id)),
    );

    let events = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Event::default().json_data(&event), rx))
    });

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(question: &str, turns: usize) -> QueryRequest {
        QueryRequest {
            question: question.to_string(),
            conversation_history: (0..turns)
                .map(|_| ConversationTurn::new(citeforge_common::Role::User, "q"))
                .collect(),
            previous_context_chunks: Vec::new(),
            language: default_language(),
        }
    }

    #[test]
    fn test_question_bounds() {
        assert!(request("How is CKD staged?", 0).validate().is_ok());
        assert!(request("   ", 0).validate().is_err());
        assert!(request(&"a".repeat(MAX_QUESTION_CHARS), 0).validate().is_ok());
        assert!(request(&"a".repeat(MAX_QUESTION_CHARS + 1), 0).validate().is_err());
    }

    #[test]
    fn test_history_bound() {
        assert!(request("q", MAX_HISTORY_TURNS).validate().is_ok());
        assert!(request("q", MAX_HISTORY_TURNS + 1).validate().is_err());
    }

    #[test]
    fn test_optional_fields_default() {
        let request: QueryRequest = serde_json::from_str(r#"{"question": "고양이 구토"}"#).unwrap();
        assert_eq!(request.language, "한국어");
        assert!(request.conversation_history.is_empty());
        assert!(request.previous_context_chunks.is_empty());
    }
}

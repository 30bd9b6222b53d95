//! Conversation title handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::AppState;
use citeforge_context::synthesis::fallback_title;

#[derive(Debug, Default, Deserialize)]
pub struct TitleRequest {
    #[serde(default, alias = "firstMessage")]
    pub first_message: String,
}

#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub title: String,
}

/// Generate a conversation title. Always answers 200; unreadable bodies are
/// treated as an empty message.
pub async fn generate_title(
    State(state): State<AppState>,
    body: std::result::Result<Json<TitleRequest>, JsonRejection>,
) -> Json<TitleResponse> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Unreadable title request");
            TitleRequest::default()
        }
    };

    let timeout = state.config.request_timeout();
    let title = match tokio::time::timeout(timeout, state.titles.generate(&request.first_message)).await {
        Ok(title) => title,
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "Title generation timed out");
            fallback_title(&request.first_message)
        }
    };

    Json(TitleResponse { title })
}

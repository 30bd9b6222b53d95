//! Health check handlers

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::AppState;
use citeforge_common::errors::{AppError, Result};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub services: ServiceStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ServiceStatus {
    pub llm: String,
    pub embedding: String,
    pub vector_index: String,
    pub vectors: u64,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
}

/// Provider connectivity and index size. Fails with 500 when the index
/// cannot report its stats; the provider's error is logged, not returned.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let stats = state.index.describe_stats().await.map_err(|e| {
        tracing::error!(error = %e, provider = state.index.provider_name(), "Index stats unavailable");
        AppError::Internal {
            message: "vector index unavailable".to_string(),
        }
    })?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        services: ServiceStatus {
            llm: state.chat.provider_name().to_string(),
            embedding: state.embedder.model_name().to_string(),
            vector_index: state.index.provider_name().to_string(),
            vectors: stats.total_vector_count,
        },
        timestamp: Utc::now(),
    }))
}

/// Liveness probe - always ok if the server is running
pub async fn ready() -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ok".to_string(),
    })
}

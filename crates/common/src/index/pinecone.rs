//! Pinecone-compatible REST client

use super::{IndexStats, VectorIndex};
use crate::config::IndexConfig;
use crate::errors::{AppError, Result};
use crate::models::{ChunkRecord, EvidenceChunk};
use crate::retry::with_retry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_RETRIES: u32 = 2;

/// Pinecone data-plane client
pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<ChunkRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    dimension: usize,
}

impl QueryMatch {
    fn into_chunk(self) -> EvidenceChunk {
        let mut record = self.metadata.unwrap_or_default();
        record.chunk_id = record.chunk_id.or(Some(self.id));
        record.score = Some(self.score);
        EvidenceChunk::from(record)
    }
}

impl PineconeIndex {
    /// Create a new client for the index at `config.host`
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let host = config.host.clone().ok_or_else(|| AppError::Configuration {
            message: "index.host is required for the pinecone provider".to_string(),
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "index.api_key is required for the pinecone provider".to_string(),
        })?;

        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
            namespace: config.namespace.clone().filter(|ns| !ns.is_empty()),
            timeout,
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::UpstreamTimeout {
                        service: "vector_index".to_string(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    AppError::HttpClient(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("API error {}: {}", status, body);
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                AppError::ServiceUnavailable { message }
            } else {
                AppError::VectorIndex { message }
            });
        }

        Ok(response)
    }

    async fn query_once(&self, request: &QueryRequest<'_>) -> Result<Vec<EvidenceChunk>> {
        let response: QueryResponse = self
            .post("/query", request)
            .await?
            .json()
            .await
            .map_err(|e| AppError::VectorIndex {
                message: format!("Failed to parse query response: {}", e),
            })?;

        Ok(response.matches.into_iter().map(QueryMatch::into_chunk).collect())
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<EvidenceChunk>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };
        with_retry("vector_index", MAX_RETRIES, || self.query_once(&request)).await
    }

    async fn describe_stats(&self) -> Result<IndexStats> {
        let stats: StatsResponse = self
            .post("/describe_index_stats", &serde_json::json!({}))
            .await?
            .json()
            .await
            .map_err(|e| AppError::VectorIndex {
                message: format!("Failed to parse index stats: {}", e),
            })?;

        Ok(IndexStats {
            total_vector_count: stats.total_vector_count,
            dimension: stats.dimension,
        })
    }

    fn provider_name(&self) -> &str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_shape() {
        let vector = [0.1_f32, 0.2];
        let request = QueryRequest {
            vector: &vector,
            top_k: 15,
            include_metadata: true,
            namespace: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["topK"], 15);
        assert_eq!(value["includeMetadata"], true);
        assert!(value.get("namespace").is_none());
    }

    #[test]
    fn test_match_metadata_becomes_chunk() {
        let response: QueryResponse = serde_json::from_value(serde_json::json!({
            "matches": [
                {
                    "id": "vec-17",
                    "score": 0.91,
                    "metadata": {
                        "text": "Maropitant 1 mg/kg SC q24h",
                        "title": "Antiemetic therapy in dogs",
                        "journal": "JVIM",
                        "year": 2019,
                        "page": 4
                    }
                },
                { "id": "vec-18", "score": 0.5 }
            ]
        }))
        .unwrap();

        let chunks: Vec<_> = response.matches.into_iter().map(QueryMatch::into_chunk).collect();
        assert_eq!(chunks[0].chunk_id.as_deref(), Some("vec-17"));
        assert_eq!(chunks[0].source_id, "JVIM");
        assert_eq!(chunks[0].year, "2019");
        assert!((chunks[0].relevance_score - 0.91).abs() < 1e-6);
        assert_eq!(chunks[1].title, crate::models::UNKNOWN);
    }

    #[test]
    fn test_host_is_normalized() {
        let index = PineconeIndex::new(&IndexConfig {
            provider: "pinecone".to_string(),
            host: Some("guidelines-abc.svc.pinecone.io/".to_string()),
            api_key: Some("pc-key".to_string()),
            namespace: Some(String::new()),
            ..IndexConfig::default()
        })
        .unwrap();

        assert_eq!(index.host, "https://guidelines-abc.svc.pinecone.io");
        assert_eq!(index.namespace, None);
    }
}

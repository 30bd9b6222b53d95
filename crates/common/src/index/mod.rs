//! Vector index abstraction
//!
//! Provides a unified interface for similarity lookups:
//! - Pinecone-compatible REST data plane
//! - In-memory cosine index for local runs and tests

mod memory;
mod pinecone;

pub use memory::InMemoryIndex;
pub use pinecone::PineconeIndex;

use crate::config::IndexConfig;
use crate::errors::Result;
use crate::models::EvidenceChunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Index statistics reported by the health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_vector_count: u64,
    pub dimension: usize,
}

/// Trait for vector similarity lookups
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` chunks nearest to `vector`, best first.
    ///
    /// Each chunk's `relevance_score` carries the similarity reported by the
    /// index.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<EvidenceChunk>>;

    /// Describe the index (vector count, dimension).
    async fn describe_stats(&self) -> Result<IndexStats>;

    /// Provider name (e.g., "pinecone", "memory")
    fn provider_name(&self) -> &str;
}

/// Create a vector index client based on configuration
pub fn create_vector_index(config: &IndexConfig, dimension: usize) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "pinecone" => Ok(Arc::new(PineconeIndex::new(config)?)),
        "mock" | "memory" => Ok(Arc::new(InMemoryIndex::new(dimension))),
        other => {
            tracing::warn!(provider = other, "Unknown index provider, using in-memory index");
            Ok(Arc::new(InMemoryIndex::new(dimension)))
        }
    }
}

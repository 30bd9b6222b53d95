//! Concurrent top-k lookups against the vector index

use citeforge_common::index::VectorIndex;
use citeforge_common::models::EvidenceChunk;
use futures::future::join_all;
use std::sync::Arc;

/// Outcome of one lookup round
#[derive(Debug, Default)]
pub struct LookupRound {
    /// Results per query vector, in query order. A failed lookup contributes
    /// an empty list.
    pub results: Vec<Vec<EvidenceChunk>>,

    /// Number of lookups that errored
    pub failures: usize,
}

/// Vector retriever over any [`VectorIndex`]
pub struct VectorRetriever {
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl VectorRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }

    pub fn provider_name(&self) -> &str {
        self.index.provider_name()
    }

    /// Run one lookup per vector concurrently and wait for all of them.
    pub async fn lookup_all(&self, vectors: &[Vec<f32>]) -> LookupRound {
        let lookups = vectors
            .iter()
            .map(|vector| self.index.query(vector, self.top_k));

        let mut round = LookupRound::default();
        for (position, outcome) in join_all(lookups).await.into_iter().enumerate() {
            match outcome {
                Ok(chunks) => {
                    tracing::debug!(query = position, matches = chunks.len(), "Lookup complete");
                    round.results.push(chunks);
                }
                Err(e) => {
                    tracing::warn!(query = position, error = %e, "Lookup failed, counting as no results");
                    round.failures += 1;
                    round.results.push(Vec::new());
                }
            }
        }
        round
    }
}

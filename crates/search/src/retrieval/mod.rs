//! Evidence retrieval
//!
//! The fuser runs in two steps so callers can report progress between them:
//! 1. [`EvidenceFuser::embed_queries`]: expansion plus one embedding per phrasing
//! 2. [`EvidenceFuser::search_and_merge`]: concurrent lookups, dedup, rank,
//!    cap and carry-over merge
//!
//! Neither step returns an error. Provider failures are counted in the
//! [`Degradation`] record and the affected queries contribute nothing.

mod expansion;
mod fusion;
mod vector;

pub use expansion::{parse_alternatives, QueryExpander};
pub use fusion::EvidenceFusion;
pub use vector::{LookupRound, VectorRetriever};

use citeforge_common::config::{LlmConfig, RetrievalConfig};
use citeforge_common::embeddings::Embedder;
use citeforge_common::index::VectorIndex;
use citeforge_common::language::Language;
use citeforge_common::llm::ChatClient;
use citeforge_common::metrics;
use citeforge_common::models::EvidenceChunk;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Why retrieval produced nothing usable, when every upstream call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationReason {
    AllEmbeddingsFailed,
    AllLookupsFailed,
}

/// Upstream failures absorbed during one retrieval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Degradation {
    pub failed_embeddings: usize,
    pub failed_lookups: usize,
    pub reason: Option<DegradationReason>,
}

impl Degradation {
    /// Every embedding or every lookup failed.
    pub fn is_outage(&self) -> bool {
        self.reason.is_some()
    }
}

/// Query phrasings and the vectors that embedded successfully
#[derive(Debug, Clone)]
pub struct EmbeddedQueries {
    pub queries: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
    pub failed_embeddings: usize,
    started: Instant,
}

/// Ranked evidence plus what went wrong getting it
#[derive(Debug, Clone)]
pub struct FusedEvidence {
    pub chunks: Vec<EvidenceChunk>,
    pub degradation: Degradation,
}

impl FusedEvidence {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Multi-query evidence fuser
pub struct EvidenceFuser {
    expander: QueryExpander,
    embedder: Arc<dyn Embedder>,
    retriever: VectorRetriever,
    fusion: EvidenceFusion,
}

impl EvidenceFuser {
    /// Create a fuser over the given providers
    pub fn new(
        chat: Arc<dyn ChatClient>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        llm: &LlmConfig,
        retrieval: &RetrievalConfig,
    ) -> Self {
        Self {
            expander: QueryExpander::new(
                chat,
                llm.auxiliary_model.clone(),
                llm.auxiliary_temperature,
                retrieval.max_queries,
            ),
            embedder,
            retriever: VectorRetriever::new(index, retrieval.top_k),
            fusion: EvidenceFusion::new(retrieval.evidence_cap, retrieval.carry_over_limit),
        }
    }

    /// Expand the question and embed every phrasing concurrently.
    pub async fn embed_queries(&self, question: &str, language: Language) -> EmbeddedQueries {
        let started = Instant::now();
        let queries = self.expander.expand(question, language).await;

        let embeddings = join_all(queries.iter().map(|query| self.embedder.embed(query))).await;

        let mut vectors = Vec::with_capacity(embeddings.len());
        let mut failed_embeddings = 0;
        for (position, outcome) in embeddings.into_iter().enumerate() {
            match outcome {
                Ok(vector) => vectors.push(vector),
                Err(e) => {
                    tracing::warn!(query = position, error = %e, "Query embedding failed, skipping phrasing");
                    failed_embeddings += 1;
                }
            }
        }

        metrics::record_embedding_failures(self.embedder.model_name(), failed_embeddings);
        tracing::info!(
            queries = queries.len(),
            embedded = vectors.len(),
            "Query phrasings embedded"
        );

        EmbeddedQueries {
            queries,
            vectors,
            failed_embeddings,
            started,
        }
    }

    /// Look up every embedded phrasing concurrently, then fuse.
    pub async fn search_and_merge(&self, embedded: EmbeddedQueries, carried: &[EvidenceChunk]) -> FusedEvidence {
        let round = self.retriever.lookup_all(&embedded.vectors).await;
        metrics::record_lookup_failures(self.retriever.provider_name(), round.failures);

        let reason = if !embedded.queries.is_empty() && embedded.vectors.is_empty() {
            Some(DegradationReason::AllEmbeddingsFailed)
        } else if !embedded.vectors.is_empty() && round.failures == embedded.vectors.len() {
            Some(DegradationReason::AllLookupsFailed)
        } else {
            None
        };

        let mut chunks = self.fusion.rank(round.results);
        let primary = chunks.len();
        let carried_added = self.fusion.merge_carried(&mut chunks, carried);

        metrics::record_fusion(
            embedded.started.elapsed().as_secs_f64(),
            embedded.queries.len(),
            chunks.len(),
        );
        tracing::info!(
            primary,
            carried_added,
            total = chunks.len(),
            failed_embeddings = embedded.failed_embeddings,
            failed_lookups = round.failures,
            "Evidence fused"
        );

        FusedEvidence {
            chunks,
            degradation: Degradation {
                failed_embeddings: embedded.failed_embeddings,
                failed_lookups: round.failures,
                reason,
            },
        }
    }

    /// Both steps in one call.
    pub async fn fuse(&self, question: &str, language: Language, carried: &[EvidenceChunk]) -> FusedEvidence {
        let embedded = self.embed_queries(question, language).await;
        self.search_and_merge(embedded, carried).await
    }
}

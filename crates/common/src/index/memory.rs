//! In-memory cosine-similarity index

use super::{IndexStats, VectorIndex};
use crate::errors::{AppError, Result};
use crate::models::EvidenceChunk;
use async_trait::async_trait;
use std::sync::RwLock;

/// Brute-force index over vectors held in memory.
pub struct InMemoryIndex {
    dimension: usize,
    entries: RwLock<Vec<(Vec<f32>, EvidenceChunk)>>,
}

impl InMemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Add a chunk under `vector`.
    pub fn insert(&self, vector: Vec<f32>, chunk: EvidenceChunk) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(AppError::VectorIndex {
                message: format!(
                    "Vector dimension {} does not match index dimension {}",
                    vector.len(),
                    self.dimension
                ),
            });
        }

        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((vector, chunk));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<EvidenceChunk>> {
        if vector.len() != self.dimension {
            return Err(AppError::VectorIndex {
                message: format!(
                    "Query dimension {} does not match index dimension {}",
                    vector.len(),
                    self.dimension
                ),
            });
        }

        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut scored: Vec<EvidenceChunk> = entries
            .iter()
            .map(|(stored, chunk)| {
                let mut chunk = chunk.clone();
                chunk.relevance_score = cosine(vector, stored);
                chunk
            })
            .collect();

        scored.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn describe_stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            total_vector_count: self.len() as u64,
            dimension: self.dimension,
        })
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}

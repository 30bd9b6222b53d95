//! Evidence fusion across lookups
//!
//! Lookups for different phrasings of one question overlap heavily. Fusion:
//! - keeps the first occurrence of each (source, title, page)
//! - ranks by index similarity, best first, ties in arrival order
//! - caps the primary set
//! - appends carried-over chunks the new set does not already contain

use citeforge_common::models::EvidenceChunk;
use std::collections::HashSet;

/// Evidence fusion parameters
#[derive(Debug, Clone)]
pub struct EvidenceFusion {
    /// Size of the primary evidence set
    pub cap: usize,

    /// Carried-over chunks considered for the merge
    pub carry_over_limit: usize,
}

impl Default for EvidenceFusion {
    fn default() -> Self {
        Self {
            cap: 25,
            carry_over_limit: 5,
        }
    }
}

impl EvidenceFusion {
    pub fn new(cap: usize, carry_over_limit: usize) -> Self {
        Self {
            cap,
            carry_over_limit,
        }
    }

    /// Deduplicate, rank and cap the results of every lookup.
    ///
    /// `results` is in lookup order; within a lookup, in index order.
    pub fn rank(&self, results: Vec<Vec<EvidenceChunk>>) -> Vec<EvidenceChunk> {
        let mut seen: HashSet<(String, String, i64)> = HashSet::new();
        let mut ranked: Vec<EvidenceChunk> = Vec::new();

        for chunk in results.into_iter().flatten() {
            let (source, title, page) = chunk.dedup_key();
            if seen.insert((source.to_string(), title.to_string(), page)) {
                ranked.push(chunk);
            }
        }

        // Vec::sort_by is stable
        ranked.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        ranked.truncate(self.cap);
        ranked
    }

    /// Append carried-over chunks whose id is not already present.
    ///
    /// Only the first `carry_over_limit` carried chunks are considered, and
    /// chunks without an id are skipped. Returns how many were added.
    pub fn merge_carried(&self, evidence: &mut Vec<EvidenceChunk>, carried: &[EvidenceChunk]) -> usize {
        let mut present: HashSet<String> = evidence
            .iter()
            .filter_map(|chunk| chunk.chunk_id.clone())
            .collect();

        let mut added = 0;
        for chunk in carried.iter().take(self.carry_over_limit) {
            let Some(id) = chunk.chunk_id.as_ref() else {
                continue;
            };
            if present.insert(id.clone()) {
                evidence.push(chunk.clone());
                added += 1;
            }
        }
        added
    }
}

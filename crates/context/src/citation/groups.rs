//! Document groups
//!
//! Citation indices address citable works, not chunks. Chunks sharing a
//! (source, title) pair form one group; groups are numbered in the order
//! their first chunk appears in the evidence set.

use citeforge_common::models::EvidenceChunk;
use std::collections::HashMap;

/// Evidence chunks grouped by citable work, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct DocumentGroups {
    groups: Vec<Vec<EvidenceChunk>>,
}

impl DocumentGroups {
    pub fn from_chunks(chunks: &[EvidenceChunk]) -> Self {
        let mut position: HashMap<(&str, &str), usize> = HashMap::new();
        let mut groups: Vec<Vec<EvidenceChunk>> = Vec::new();

        for chunk in chunks {
            let slot = *position.entry(chunk.group_key()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(chunk.clone());
        }

        Self { groups }
    }

    /// Number of citable documents; valid indices are `0..len()`.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Chunks of group `index`, in evidence order.
    pub fn get(&self, index: usize) -> Option<&[EvidenceChunk]> {
        self.groups.get(index).map(Vec::as_slice)
    }

    /// The chunk whose metadata represents group `index`. When chunks of a
    /// group disagree on metadata, the first one wins.
    pub fn representative(&self, index: usize) -> Option<&EvidenceChunk> {
        self.groups.get(index).and_then(|chunks| chunks.first())
    }

    pub fn iter(&self) -> impl Iterator<Item = &[EvidenceChunk]> {
        self.groups.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeforge_common::models::ChunkRecord;

    fn chunk(source: &str, title: &str, text: &str) -> EvidenceChunk {
        EvidenceChunk::from(ChunkRecord {
            source: Some(source.to_string()),
            title: Some(title.to_string()),
            text: Some(text.to_string()),
            ..ChunkRecord::default()
        })
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let chunks = vec![
            chunk("KSVM", "CKD", "a"),
            chunk("JVIM", "Vomiting", "b"),
            chunk("KSVM", "CKD", "c"),
            chunk("JVIM", "CKD", "d"),
        ];

        let groups = DocumentGroups::from_chunks(&chunks);

        assert_eq!(groups.len(), 3);
        let texts: Vec<&str> = groups.get(0).unwrap().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);
        assert_eq!(groups.representative(1).unwrap().title, "Vomiting");
        assert_eq!(groups.representative(2).unwrap().source_id, "JVIM");
        assert!(groups.get(3).is_none());
    }
}

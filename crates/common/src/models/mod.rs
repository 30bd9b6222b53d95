//! Core data model shared by retrieval, synthesis and the gateway
//!
//! - `EvidenceChunk`: one retrieved passage with bibliographic metadata
//! - `Reference`: a resolved, citable work in the final answer
//! - `ConversationTurn`: caller-supplied history
//! - `StreamEvent`: the server-push protocol

mod de;
mod events;

pub use events::StreamEvent;

use serde::{Deserialize, Serialize};

/// Placeholder for bibliographic fields the corpus did not record.
pub const UNKNOWN: &str = "Unknown";

/// One retrieved passage.
///
/// Absent metadata is resolved once, when the chunk enters the system (index
/// adapter or request body), through [`ChunkRecord`]. Everything downstream
/// reads plain fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ChunkRecord")]
pub struct EvidenceChunk {
    /// Stable identifier used to merge carried-over evidence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,

    /// Passage text
    pub text: String,

    /// Source collection or guideline name
    #[serde(rename = "source")]
    pub source_id: String,

    pub title: String,
    pub authors: String,
    pub journal: String,
    pub year: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmcid: Option<String>,

    /// Page within the source document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,

    /// Chunk position within the source document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<i64>,

    /// Similarity score reported by the index
    #[serde(rename = "score")]
    pub relevance_score: f32,
}

impl EvidenceChunk {
    /// Key identifying the citable work this chunk belongs to.
    pub fn group_key(&self) -> (&str, &str) {
        (&self.source_id, &self.title)
    }

    /// Key used to deduplicate results across lookups. A missing page counts
    /// as page 0.
    pub fn dedup_key(&self) -> (&str, &str, i64) {
        (&self.source_id, &self.title, self.page.unwrap_or(0))
    }
}

/// Loosely typed chunk metadata as stored in the vector index or echoed back
/// by clients.
///
/// Numbers may arrive as strings and vice versa; blank strings count as
/// absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkRecord {
    #[serde(default, deserialize_with = "de::opt_string")]
    pub chunk_id: Option<String>,
    #[serde(default, alias = "content")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub authors: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub journal: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub doi: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub pmid: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub pmcid: Option<String>,
    #[serde(default, deserialize_with = "de::opt_int")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "de::opt_int")]
    pub chunk_index: Option<i64>,
    #[serde(default)]
    pub score: Option<f32>,
}

impl From<ChunkRecord> for EvidenceChunk {
    fn from(record: ChunkRecord) -> Self {
        let unknown = || UNKNOWN.to_string();
        let source_id = record
            .source
            .or_else(|| record.journal.clone())
            .unwrap_or_else(unknown);

        Self {
            chunk_id: record.chunk_id,
            text: record.text.unwrap_or_default(),
            source_id,
            title: record.title.unwrap_or_else(unknown),
            authors: record.authors.unwrap_or_else(unknown),
            journal: record.journal.unwrap_or_else(unknown),
            year: record.year.unwrap_or_else(unknown),
            doi: record.doi,
            pmid: record.pmid,
            pmcid: record.pmcid,
            page: record.page,
            chunk_index: record.chunk_index,
            relevance_score: record.score.unwrap_or(0.0),
        }
    }
}

/// A resolved bibliographic reference, in final citation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub authors: String,
    pub journal: String,
    pub year: String,
    pub doi: String,
    pub url: String,
    #[serde(rename = "source")]
    pub source_label: String,
    pub relevance_score: f32,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior message, resent by the caller on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunk_defaults_resolved_at_boundary() {
        let chunk: EvidenceChunk = serde_json::from_value(json!({
            "text": "Oclacitinib 0.4-0.6 mg/kg PO q12h",
            "title": "Canine atopic dermatitis guideline",
            "year": 2021.0,
            "page": 12.0,
            "doi": "",
            "score": 0.83
        }))
        .unwrap();

        assert_eq!(chunk.source_id, UNKNOWN);
        assert_eq!(chunk.authors, UNKNOWN);
        assert_eq!(chunk.year, "2021");
        assert_eq!(chunk.page, Some(12));
        assert_eq!(chunk.doi, None);
        assert!((chunk.relevance_score - 0.83).abs() < f32::EPSILON);
    }

    #[test]
    fn test_source_falls_back_to_journal() {
        let chunk: EvidenceChunk = serde_json::from_value(json!({
            "text": "t",
            "title": "Feline CKD staging",
            "journal": "BMC Veterinary Research",
            "pmcid": "PMC1234567"
        }))
        .unwrap();

        assert_eq!(chunk.source_id, "BMC Veterinary Research");
        assert_eq!(chunk.pmcid.as_deref(), Some("PMC1234567"));
    }

    #[test]
    fn test_chunk_roundtrips_through_wire_names() {
        let chunk: EvidenceChunk = serde_json::from_value(json!({
            "chunk_id": "kr-guideline-3",
            "text": "t",
            "source": "KSVM",
            "title": "Guideline",
            "authors": ["Kim", "Lee"],
            "pmid": 31234567,
            "score": 0.5
        }))
        .unwrap();

        assert_eq!(chunk.authors, "Kim, Lee");
        assert_eq!(chunk.pmid.as_deref(), Some("31234567"));

        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["source"], "KSVM");
        assert_eq!(value["chunk_id"], "kr-guideline-3");
        assert!(value.get("doi").is_none());

        let back: EvidenceChunk = serde_json::from_value(value).unwrap();
        assert_eq!(back, chunk);
    }

    #[test]
    fn test_missing_page_keys_as_page_zero() {
        let paged: EvidenceChunk =
            serde_json::from_value(json!({"text": "a", "source": "KSVM", "title": "Guideline", "page": 0}))
                .unwrap();
        let unpaged: EvidenceChunk =
            serde_json::from_value(json!({"text": "b", "source": "KSVM", "title": "Guideline"})).unwrap();

        assert_eq!(unpaged.page, None);
        assert_eq!(paged.dedup_key(), unpaged.dedup_key());
    }

    #[test]
    fn test_conversation_turn_roles() {
        let turn: ConversationTurn =
            serde_json::from_value(json!({"role": "assistant", "content": "hi"})).unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert!(serde_json::from_value::<ConversationTurn>(json!({"role": "tool", "content": ""}))
            .is_err());
    }
}

//! Server-push protocol events
//!
//! Each event serializes to one JSON object discriminated by `status`.

use super::{EvidenceChunk, Reference};
use serde::{Deserialize, Serialize};

/// One event in the answer stream, in protocol order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StreamEvent {
    Translating { message: String },
    Embedding { message: String },
    Searching { message: String },
    Generating { message: String },
    Streaming { chunk: String },
    ReferencesReady {
        answer: String,
        references: Vec<Reference>,
    },
    Done {
        message: String,
        context_chunks: Vec<EvidenceChunk>,
    },
    FollowupReady { followup_questions: Vec<String> },
    OutOfScope { message: String },
    Error { message: String },
}

impl StreamEvent {
    /// Wire name of the event, as written in the `status` field.
    pub fn status(&self) -> &'static str {
        match self {
            StreamEvent::Translating { .. } => "translating",
            StreamEvent::Embedding { .. } => "embedding",
            StreamEvent::Searching { .. } => "searching",
            StreamEvent::Generating { .. } => "generating",
            StreamEvent::Streaming { .. } => "streaming",
            StreamEvent::ReferencesReady { .. } => "references_ready",
            StreamEvent::Done { .. } => "done",
            StreamEvent::FollowupReady { .. } => "followup_ready",
            StreamEvent::OutOfScope { .. } => "out_of_scope",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Events after which nothing but `followup_ready` may follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Done { .. } | StreamEvent::OutOfScope { .. } | StreamEvent::Error { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_discriminator() {
        let event = StreamEvent::Streaming {
            chunk: "Fact one{{citation:0}}".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"status": "streaming", "chunk": "Fact one{{citation:0}}"}));
        assert_eq!(event.status(), value["status"]);
    }

    #[test]
    fn test_followup_payload_name() {
        let event = StreamEvent::FollowupReady {
            followup_questions: vec!["q1".into()],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "followup_ready");
        assert_eq!(value["followup_questions"][0], "q1");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_terminal_events() {
        assert!(StreamEvent::Error { message: String::new() }.is_terminal());
        assert!(StreamEvent::OutOfScope { message: String::new() }.is_terminal());
        assert!(!StreamEvent::Generating { message: String::new() }.is_terminal());
    }
}

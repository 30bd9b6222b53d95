//! CiteForge retrieval
//!
//! Turns a question into a ranked, deduplicated evidence set:
//! query expansion, one embedding per phrasing, concurrent top-k lookups,
//! and a capped merge with evidence carried over from the previous turn.

pub mod retrieval;

pub use retrieval::{
    Degradation, DegradationReason, EmbeddedQueries, EvidenceFuser, FusedEvidence,
};

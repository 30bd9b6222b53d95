//! CiteForge answer engine
//!
//! Everything between "evidence is available" and "the client has a cited
//! answer":
//! - Streaming citation tokenizer and document grouping
//! - Reference remapping to dense, ordered citations
//! - Answer streaming, follow-up questions and conversation titles
//! - The per-request orchestrator that emits the event protocol

pub mod citation;
pub mod orchestrator;
pub mod synthesis;

pub use citation::{CitationTokenizer, DocumentGroups, ReferenceRemapper, RemappedAnswer};
pub use orchestrator::{AnswerRequest, ConversationOrchestrator};
pub use synthesis::{AnswerOutcome, AnswerStreamer, FollowupSynthesizer, StreamedAnswer, TitleSynthesizer};

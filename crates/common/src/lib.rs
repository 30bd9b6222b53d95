//! CiteForge Common Library
//!
//! Shared code for the CiteForge services including:
//! - Evidence, reference and stream-event models
//! - Embedding, chat-completion and vector index clients
//! - Error types and handling
//! - Configuration management
//! - Reference lookup tables
//! - Metrics and observability

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod index;
pub mod language;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod reference_data;
pub mod retry;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use index::VectorIndex;
pub use language::{Language, Message};
pub use llm::ChatClient;
pub use models::{ConversationTurn, EvidenceChunk, Reference, Role, StreamEvent};
pub use reference_data::ReferenceDirectory;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

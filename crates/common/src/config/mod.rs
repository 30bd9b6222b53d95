//! Configuration management for CiteForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values
//!
//! Every field carries a serde default, so an empty environment yields a
//! runnable configuration backed by the mock providers.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chat-completion service configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Retrieval fusion parameters
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Answer generation parameters
    #[serde(default)]
    pub answer: AnswerConfig,

    /// Offline reference lookup tables
    #[serde(default)]
    pub reference_data: ReferenceDataConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Timeout for non-streaming requests in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Allowed CORS origins (empty allows any origin)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_mock_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Chat provider: openai, mock
    #[serde(default = "default_mock_provider")]
    pub provider: String,

    /// API key for the chat service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model used for the streamed, cited answer
    #[serde(default = "default_answer_model")]
    pub answer_model: String,

    /// Model used for query expansion, follow-ups and titles
    #[serde(default = "default_auxiliary_model")]
    pub auxiliary_model: String,

    /// Sampling temperature for the answer
    #[serde(default = "default_answer_temperature")]
    pub answer_temperature: f32,

    /// Token budget for the answer
    #[serde(default = "default_answer_max_tokens")]
    pub answer_max_tokens: u32,

    /// Sampling temperature for auxiliary calls
    #[serde(default = "default_auxiliary_temperature")]
    pub auxiliary_temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for non-streaming calls
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Index provider: pinecone, mock
    #[serde(default = "default_mock_provider")]
    pub provider: String,

    /// Index host, e.g. https://guidelines-abc123.svc.pinecone.io
    pub host: Option<String>,

    /// API key for the index
    pub api_key: Option<String>,

    /// Namespace to query (optional)
    pub namespace: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Results requested per lookup
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Maximum query phrasings, original included
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,

    /// Size of the primary evidence set
    #[serde(default = "default_evidence_cap")]
    pub evidence_cap: usize,

    /// Carried-over chunks considered from the previous turn
    #[serde(default = "default_carry_over_limit")]
    pub carry_over_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerConfig {
    /// Pause between streamed fragments in milliseconds (0 disables)
    #[serde(default = "default_typing_delay")]
    pub typing_delay_ms: u64,

    /// Conversation turns forwarded to the answer prompt
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Subject area named in the system prompt
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Characters of the answer shown to the follow-up prompt
    #[serde(default = "default_followup_answer_chars")]
    pub followup_answer_chars: usize,

    /// Capacity of the per-request event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReferenceDataConfig {
    /// filename -> URL mapping
    #[serde(default = "default_pdf_url_mapping")]
    pub pdf_url_mapping_path: String,

    /// filename -> metadata mapping (inverted to title -> filename)
    #[serde(default = "default_pdf_metadata_mapping")]
    pub pdf_metadata_mapping_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (process wide)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_mock_provider() -> String { "mock".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 1536 }
fn default_upstream_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_answer_model() -> String { "gpt-4o".to_string() }
fn default_auxiliary_model() -> String { "gpt-4o-mini".to_string() }
fn default_answer_temperature() -> f32 { 0.3 }
fn default_answer_max_tokens() -> u32 { 2000 }
fn default_auxiliary_temperature() -> f32 { 0.7 }
fn default_llm_timeout() -> u64 { 120 }
fn default_top_k() -> usize { 15 }
fn default_max_queries() -> usize { 3 }
fn default_evidence_cap() -> usize { 25 }
fn default_carry_over_limit() -> usize { 5 }
fn default_typing_delay() -> u64 { 10 }
fn default_history_turns() -> usize { 6 }
fn default_domain() -> String { "veterinary medicine".to_string() }
fn default_followup_answer_chars() -> usize { 800 }
fn default_event_buffer() -> usize { 64 }
fn default_pdf_url_mapping() -> String { "data/pdf_url_mapping.json".to_string() }
fn default_pdf_metadata_mapping() -> String { "data/pdf_metadata_mapping.json".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "citeforge".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the inter-fragment typing delay as Duration
    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.answer.typing_delay_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_mock_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_upstream_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_mock_provider(),
            api_key: None,
            api_base: None,
            answer_model: default_answer_model(),
            auxiliary_model: default_auxiliary_model(),
            answer_temperature: default_answer_temperature(),
            answer_max_tokens: default_answer_max_tokens(),
            auxiliary_temperature: default_auxiliary_temperature(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_mock_provider(),
            host: None,
            api_key: None,
            namespace: None,
            timeout_secs: default_upstream_timeout(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_queries: default_max_queries(),
            evidence_cap: default_evidence_cap(),
            carry_over_limit: default_carry_over_limit(),
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            typing_delay_ms: default_typing_delay(),
            history_turns: default_history_turns(),
            domain: default_domain(),
            followup_answer_chars: default_followup_answer_chars(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for ReferenceDataConfig {
    fn default() -> Self {
        Self {
            pdf_url_mapping_path: default_pdf_url_mapping(),
            pdf_metadata_mapping_path: default_pdf_metadata_mapping(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

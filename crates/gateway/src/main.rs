//! CiteForge API Gateway
//!
//! The HTTP surface of the answer engine.
//! Handles:
//! - Streaming cited answers over server-sent events
//! - Conversation titles
//! - Health and liveness probes
//! - Rate limiting, CORS and request ids
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use citeforge_common::{
    config::AppConfig,
    embeddings::{create_embedder, Embedder},
    index::{create_vector_index, VectorIndex},
    llm::{create_chat_client, ChatClient},
    metrics,
    reference_data::ReferenceDirectory,
    telemetry,
};
use citeforge_context::{ConversationOrchestrator, TitleSynthesizer};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub chat: Arc<dyn ChatClient>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub titles: Arc<TitleSynthesizer>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        chat: Arc<dyn ChatClient>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        directory: Arc<ReferenceDirectory>,
    ) -> Self {
        let orchestrator = ConversationOrchestrator::from_providers(
            chat.clone(),
            embedder.clone(),
            index.clone(),
            directory,
            &config,
        );
        let titles = TitleSynthesizer::new(chat.clone(), &config.llm, &config.answer);

        Self {
            config,
            chat,
            embedder,
            index,
            orchestrator: Arc::new(orchestrator),
            titles: Arc::new(titles),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing
    telemetry::init(&config.observability)?;

    info!("Starting CiteForge API Gateway v{}", citeforge_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets_for_metric(
                Matcher::Suffix("answer_duration_seconds".to_string()),
                metrics::ANSWER_BUCKETS,
            )?
            .set_buckets_for_metric(
                Matcher::Suffix("fusion_duration_seconds".to_string()),
                metrics::FUSION_BUCKETS,
            )?
            .install()?;
        metrics::register_metrics();
        info!("Metrics exporter listening on {}", metrics_addr);
    }

    // Reference data and providers
    let directory = Arc::new(ReferenceDirectory::load(&config.reference_data)?);
    let embedder = create_embedder(&config.embedding)?;
    let chat = create_chat_client(&config.llm)?;
    let index = create_vector_index(&config.index, embedder.dimension())?;

    info!(
        llm = chat.provider_name(),
        embedding = embedder.model_name(),
        index = index.provider_name(),
        "Providers ready"
    );

    // Create app state
    let state = AppState::new(config.clone(), chat, embedder, index, directory);

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        .route("/query-stream", post(handlers::query::query_stream))
        .route("/generate-title", post(handlers::title::generate_title));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(&state.config.rate_limit);
        api_routes = api_routes.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app; probes bypass the rate limit
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

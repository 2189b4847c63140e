//! HTTP API for Talk-to-Your-Data.
//!
//! # Endpoints
//! - `GET /health`: liveness probe
//! - `GET /schema`: tables and their `{name, type}` columns
//! - `POST /query`: `{ "query": "..." }` answered by the query pipeline

pub mod cli;
pub mod handlers;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Duration;
use talkdata_core::QueryPipeline;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<QueryPipeline>,
}

impl AppState {
    pub fn new(pipeline: QueryPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Listener and request settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a whole request, translation and execution included
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builds the application router.
pub fn router(state: AppState, config: &HttpConfig) -> Router {
    // The browser client is served from a different origin
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/schema", get(handlers::schema_handler))
        .route("/query", post(handlers::query_handler))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves the API until `shutdown` resolves.
///
/// # Errors
/// Returns error if the listener cannot be bound or the server fails
pub async fn serve(
    state: AppState,
    config: &HttpConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await.inspect_err(|e| {
        tracing::error!("Failed to bind HTTP listener to {}: {}", address, e);
    })?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state, config))
        .with_graceful_shutdown(shutdown)
        .await
}

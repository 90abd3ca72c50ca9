//! HTTP server wiring for Durafix
//!
//! Builds the axum router, shared state and response-wide headers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, header};
use axum::routing::{get, post};
use durafix_core::config::DurafixConfig;
use durafix_core::{Compressor, RuntimeMode};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::handlers::{compress_file, health, index_page, upload_file};

/// Assets shipped with this crate, used when no static directory is configured.
const BUNDLED_STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<DurafixConfig>,
    /// Encoder-backed compression pipeline
    pub compressor: Compressor,
    /// Mode the server was started in
    pub mode: RuntimeMode,
    /// Server start time, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Creates state with the encoder matching `mode`.
    pub fn new(config: DurafixConfig, mode: RuntimeMode) -> Self {
        let encoder = mode.build_encoder(&config.encoder);
        let compressor = Compressor::new(
            encoder,
            config.encoder.clone(),
            config.estimator.clone(),
        );
        Self::with_compressor(config, mode, compressor)
    }

    /// Creates state around an existing compressor.
    pub fn with_compressor(config: DurafixConfig, mode: RuntimeMode, compressor: Compressor) -> Self {
        Self {
            config: Arc::new(config),
            compressor,
            mode,
            started_at: Instant::now(),
        }
    }
}

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.upload.max_upload_bytes;
    let static_dir = state
        .config
        .server
        .static_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(BUNDLED_STATIC_DIR));

    Router::new()
        .route("/", get(index_page))
        .nest_service("/static", ServeDir::new(static_dir))
        .route("/health", get(health))
        .route("/upload", post(upload_file))
        .route("/compress", post(compress_file))
        .layer(DefaultBodyLimit::max(body_limit))
        // Processed files must never be served from a cache
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the server until the listener fails.
///
/// # Errors
///
/// - `std::io::Error` - Listener could not bind or the server stopped with an I/O error
pub async fn run_server(config: DurafixConfig, mode: RuntimeMode) -> std::io::Result<()> {
    let addr = config.server.socket_addr();
    let state = AppState::new(config, mode);

    if !state.compressor.encoder_available().await {
        tracing::warn!("Encoder unavailable: /compress requests will fail until ffmpeg is installed");
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "Durafix server running on http://{} ({} mode)",
        listener.local_addr()?,
        mode
    );
    axum::serve(listener, app).await
}

//! HTTP surface: router, shared state and the serve loop.

pub mod auth;
pub mod handlers;
pub mod passthrough;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::error::{DeepClaudeError, Result};
use crate::stitch::Stitcher;
use crate::upstream::http::build_client;

/// Shared state injected into axum handlers. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stitcher: Stitcher,
    pub http: reqwest::Client,
}

impl AppState {
    /// Build the HTTP client and stitcher from `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let http = build_client(config.request_timeout)?;
        let stitcher = Stitcher::from_config(&config, http.clone());
        Ok(Self {
            config: Arc::new(config),
            stitcher,
            http,
        })
    }
}

impl IntoResponse for DeepClaudeError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.category().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router. Everything except `/health` sits behind the API key.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(handlers::root))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .merge(protected)
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `config.listen_addr` and serve until the process stops.
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.listen_addr;
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "deepclaude listening");

    axum::serve(listener, app).await?;
    Ok(())
}

//! Inbound API-key check.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::DeepClaudeError;

use super::AppState;

/// Bearer token carried by a request, if any.
pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Reject requests whose bearer token does not match the configured key.
/// A no-op when no key is configured.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.requires_auth() {
        return next.run(request).await;
    }
    let expected = state.config.api_key.as_deref();

    if bearer_token(&request).is_some_and(|token| Some(token) == expected) {
        next.run(request).await
    } else {
        warn!(path = %request.uri().path(), "rejected request with invalid API key");
        DeepClaudeError::Authentication("invalid or missing API key".into()).into_response()
    }
}

//! Request handlers.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{DeepClaudeError, Result};
use crate::stitch::SseStream;
use crate::types::ConversationMessage;

use super::{passthrough, AppState};

/// Inbound chat-completion body. Unknown fields are ignored here and kept
/// intact for passthrough.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub messages: Option<Vec<ConversationMessage>>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub stream: Option<bool>,
}

impl ChatCompletionRequest {
    /// Parse and validate a raw body. Returns the messages and the requested
    /// model, if any.
    pub fn parse(body: &[u8]) -> Result<(Vec<ConversationMessage>, Option<String>)> {
        let request: Self = serde_json::from_slice(body)
            .map_err(|e| DeepClaudeError::InvalidRequest(format!("invalid JSON body: {e}")))?;

        let messages = match request.messages {
            Some(messages) if !messages.is_empty() => messages,
            _ => {
                return Err(DeepClaudeError::InvalidRequest(
                    "messages must not be empty".into(),
                ))
            }
        };
        if request.stream != Some(true) {
            return Err(DeepClaudeError::InvalidRequest(
                "only streaming is supported, stream must be true".into(),
            ));
        }
        Ok((messages, request.model))
    }
}

/// GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Welcome to DeepClaude API" }))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// POST /v1/chat/completions
pub async fn chat_completions(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();

    let (messages, model) = match ChatCompletionRequest::parse(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            info!(%request_id, error = %e, "rejected chat request");
            return e.into_response();
        }
    };

    if let Some(model) = model.filter(|m| m != state.stitcher.model_name()) {
        info!(%request_id, %model, "passing request through unchanged");
        return match passthrough::forward(&state.http, &state.config.answer, body).await {
            Ok(resp) => resp,
            Err(e) => {
                error!(%request_id, error = %e, "passthrough failed");
                e.into_response()
            }
        };
    }

    info!(%request_id, messages = messages.len(), "starting stitched stream");
    sse_response(state.stitcher.stream(request_id, messages))
}

/// Wrap an SSE byte stream in a `text/event-stream` response.
pub fn sse_response(stream: SseStream) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .header(CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|e| {
            error!("Failed to build SSE response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

//! Verbatim forwarding for requests that do not ask for the stitched model.

use axum::body::{Body, Bytes};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::Response;
use tracing::debug;

use crate::config::UpstreamEndpoint;
use crate::error::{DeepClaudeError, Result};
use crate::upstream::http::bearer_headers;

/// Post `body` unchanged to `endpoint` and relay status, content type and
/// body bytes back as they arrive.
pub async fn forward(
    http: &reqwest::Client,
    endpoint: &UpstreamEndpoint,
    body: Bytes,
) -> Result<Response> {
    debug!(url = %endpoint.url, bytes = body.len(), "passthrough forward");

    let resp = http
        .post(&endpoint.url)
        .headers(bearer_headers(&endpoint.api_key))
        .body(body)
        .send()
        .await?;

    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();

    let mut builder = Response::builder()
        .status(status)
        .header(CACHE_CONTROL, "no-cache");
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type.as_bytes());
    }

    builder
        .body(Body::from_stream(resp.bytes_stream()))
        .map_err(|e| DeepClaudeError::Stream(format!("failed to build passthrough response: {e}")))
}

//! HTTP client construction, auth headers and status mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{DeepClaudeError, Result};

/// Build the client shared by both phases and the passthrough forwarder.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .build()?)
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Map a non-success upstream status to an error.
pub fn status_to_error(status: u16, body: &str) -> DeepClaudeError {
    match status {
        401 | 403 => DeepClaudeError::Authentication(body.to_string()),
        429 => DeepClaudeError::RateLimited(body.to_string()),
        _ => DeepClaudeError::api(status, body),
    }
}

//! Streaming chat-completion client for one upstream endpoint.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use tracing::debug;

use crate::config::{Config, UpstreamEndpoint};
use crate::error::Result;
use crate::types::{ConversationMessage, Fragment, FragmentKind};

use super::decoder::fragment_stream;
use super::http::{bearer_headers, status_to_error};

/// Fragments of one upstream call. Owns the underlying connection.
pub type FragmentStream = BoxStream<'static, Result<Fragment>>;

/// Something that can run one streaming chat call.
///
/// The stitcher only talks to upstreams through this trait.
#[async_trait]
pub trait ChatStreamer: Send + Sync {
    /// Start one streaming call and return its fragments.
    ///
    /// Errors that happen before the first byte (connect failure, non-2xx
    /// status) are returned directly; later ones arrive through the stream.
    async fn stream_chat(
        &self,
        messages: &[ConversationMessage],
        model: &str,
    ) -> Result<FragmentStream>;
}

/// Upstream request body.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ConversationMessage],
    pub max_tokens: u32,
    pub stream: bool,
}

/// Client for one OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    endpoint: UpstreamEndpoint,
    reasoning_model: String,
    max_tokens: u32,
}

impl UpstreamClient {
    pub fn new(http: reqwest::Client, endpoint: UpstreamEndpoint, config: &Config) -> Self {
        Self {
            http,
            endpoint,
            reasoning_model: config.reasoning_model.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl ChatStreamer for UpstreamClient {
    async fn stream_chat(
        &self,
        messages: &[ConversationMessage],
        model: &str,
    ) -> Result<FragmentStream> {
        let body = ChatRequest {
            model,
            messages,
            max_tokens: self.max_tokens,
            stream: true,
        };
        let kind = FragmentKind::for_model(model, &self.reasoning_model);

        debug!(
            model,
            %kind,
            url = %self.endpoint.url,
            messages = messages.len(),
            "upstream stream_chat"
        );

        let resp = self
            .http
            .post(&self.endpoint.url)
            .headers(bearer_headers(&self.endpoint.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &body_text));
        }

        Ok(fragment_stream(resp.bytes_stream(), kind))
    }
}

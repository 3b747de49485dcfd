//! Two-phase stream stitching.
//!
//! A [`Stitcher`] runs the reasoning model, then the answer model, and
//! re-frames both into one `chat.completion.chunk` SSE stream. Fragments are
//! forwarded one at a time as they arrive; the only thing held across the
//! phase boundary is the thinking transcript.

pub mod session;

pub use session::{
    thinking_message, StitchSession, StitchState, PHASE_SEPARATOR, THINKING_PREFIX,
    THINKING_SUFFIX,
};

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{DeepClaudeError, Result};
use crate::types::ConversationMessage;
use crate::upstream::{ChatStreamer, UpstreamClient};

/// Outbound SSE byte stream of one stitched request.
pub type SseStream = BoxStream<'static, Result<Bytes>>;

/// Drives [`StitchSession`]s against two upstreams.
///
/// Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct Stitcher {
    reasoner: Arc<dyn ChatStreamer>,
    answerer: Arc<dyn ChatStreamer>,
    reasoning_model: String,
    answer_model: String,
    model_name: String,
}

impl Stitcher {
    pub fn new(
        config: &Config,
        reasoner: Arc<dyn ChatStreamer>,
        answerer: Arc<dyn ChatStreamer>,
    ) -> Self {
        Self {
            reasoner,
            answerer,
            reasoning_model: config.reasoning_model.clone(),
            answer_model: config.answer_model.clone(),
            model_name: config.model_name.clone(),
        }
    }

    /// Wire both phases to their configured endpoints over one HTTP client.
    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        let reasoner = UpstreamClient::new(http.clone(), config.reasoning.clone(), config);
        let answerer = UpstreamClient::new(http, config.answer.clone(), config);
        Self::new(config, Arc::new(reasoner), Arc::new(answerer))
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Stream the stitched response for `messages`.
    ///
    /// Nothing happens until the stream is polled. Any upstream failure ends
    /// the stream with one `Err` item; dropping the stream releases whichever
    /// upstream connection is open.
    pub fn stream(&self, request_id: Uuid, messages: Vec<ConversationMessage>) -> SseStream {
        let reasoner = Arc::clone(&self.reasoner);
        let answerer = Arc::clone(&self.answerer);
        let reasoning_model = self.reasoning_model.clone();
        let answer_model = self.answer_model.clone();
        let mut session = StitchSession::new(self.model_name.clone(), messages);

        let stream = async_stream::try_stream! {
            yield session.begin()?.to_sse()?;
            debug!(%request_id, chunk_id = session.chunk_id(), model = %reasoning_model, "reasoning phase");

            {
                let mut fragments = reasoner
                    .stream_chat(session.messages(), &reasoning_model)
                    .await?;
                while let Some(fragment) = fragments.next().await {
                    yield session.on_reasoning(fragment?)?.to_sse()?;
                }
            }

            yield session.finish_reasoning()?.to_sse()?;
            info!(
                %request_id,
                thinking_chars = session.thinking().chars().count(),
                "reasoning phase complete"
            );
            debug!(%request_id, model = %answer_model, "answer phase");

            {
                let mut fragments = answerer
                    .stream_chat(session.messages(), &answer_model)
                    .await?;
                while let Some(fragment) = fragments.next().await {
                    yield session.on_answer(fragment?)?.to_sse()?;
                }
            }

            yield session.finish()?.to_sse()?;
            yield session.close()?;
            info!(%request_id, "stitched stream complete");
        };

        boxed(stream.inspect_err(move |e: &DeepClaudeError| {
            error!(%request_id, error = %e, category = %e.category(), "stitched stream aborted");
        }))
    }
}

fn boxed<S>(stream: S) -> SseStream
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    Box::pin(stream)
}

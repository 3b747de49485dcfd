//! Shared test helpers: a scripted upstream and SSE frame parsing.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use deepclaude::config::{Config, UpstreamEndpoint};
use deepclaude::error::{DeepClaudeError, Result};
use deepclaude::stitch::SseStream;
use deepclaude::types::{ConversationMessage, Fragment, OutboundEnvelope};
use deepclaude::upstream::{ChatStreamer, FragmentStream};

/// What one scripted upstream call does.
pub enum Script {
    /// Succeed and stream these items.
    Items(Vec<Result<Fragment>>),
    /// Fail before streaming anything.
    Fail(DeepClaudeError),
}

impl Script {
    pub fn thinking(texts: &[&str]) -> Self {
        Self::Items(texts.iter().map(|t| Ok(Fragment::thinking(*t))).collect())
    }

    pub fn content(texts: &[&str]) -> Self {
        Self::Items(texts.iter().map(|t| Ok(Fragment::content(*t))).collect())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<ConversationMessage>,
}

struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// An upstream that replays queued scripts and records every call.
#[derive(Default)]
pub struct ScriptedStreamer {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<RecordedCall>>,
    released: Arc<AtomicBool>,
}

impl ScriptedStreamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(script: Script) -> Arc<Self> {
        let streamer = Self::new();
        streamer.queue(script);
        Arc::new(streamer)
    }

    pub fn queue(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether the last returned fragment stream has been dropped.
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatStreamer for ScriptedStreamer {
    async fn stream_chat(
        &self,
        messages: &[ConversationMessage],
        model: &str,
    ) -> Result<FragmentStream> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            messages: messages.to_vec(),
        });
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Items(items)) => {
                self.released.store(false, Ordering::SeqCst);
                let guard = ReleaseGuard(Arc::clone(&self.released));
                let stream = futures::stream::iter(items).map(move |item| {
                    let _held = &guard;
                    item
                });
                Ok(Box::pin(stream))
            }
            Some(Script::Fail(e)) => Err(e),
            None => Err(DeepClaudeError::InvalidState(
                "no scripted upstream response".into(),
            )),
        }
    }
}

/// Test config pointing both phases at `base` (e.g. a wiremock URI).
pub fn test_config(base: &str) -> Config {
    let url = format!("{base}/v1/chat/completions");
    Config::builder()
        .reasoning(UpstreamEndpoint::new(url.clone(), "test-key"))
        .answer(UpstreamEndpoint::new(url, "test-key"))
        .build()
}

/// One parsed outbound SSE frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Chunk(OutboundEnvelope),
    Done,
}

impl Frame {
    pub fn text(&self) -> Option<&str> {
        match self {
            Frame::Chunk(env) => env.text(),
            Frame::Done => None,
        }
    }
}

/// Split raw SSE bytes into frames. Panics on anything malformed.
pub fn parse_frames(raw: &[u8]) -> Vec<Frame> {
    let text = std::str::from_utf8(raw).expect("utf-8 body");
    text.split_terminator("\n\n")
        .map(|frame| {
            let data = frame.strip_prefix("data: ").expect("data: prefix");
            if data == "[DONE]" {
                Frame::Done
            } else {
                Frame::Chunk(serde_json::from_str(data).expect("envelope json"))
            }
        })
        .collect()
}

/// Drain a stitched stream, returning everything before the first error
/// and the error itself.
pub async fn drain(mut stream: SseStream) -> (Vec<Frame>, Option<DeepClaudeError>) {
    let mut raw = Vec::new();
    let mut failure = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(bytes) => raw.extend_from_slice(&bytes),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    (parse_frames(&raw), failure)
}

/// Texts of all content chunks, skipping start/end/done.
pub fn content_texts(frames: &[Frame]) -> Vec<String> {
    frames
        .iter()
        .filter_map(|f| match f {
            Frame::Chunk(env) if env.id != "chatcmpl-start-message-id" => {
                env.text().map(str::to_string)
            }
            _ => None,
        })
        .collect()
}

/// Upstream SSE body emitting one delta per text, then `[DONE]`.
pub fn sse_body(texts: &[&str]) -> String {
    let mut body = String::new();
    for text in texts {
        let json = serde_json::json!({
            "id": "up-1",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]
        });
        body.push_str(&format!("data: {json}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

//! Outbound chat-completion chunk and its SSE framing.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CHUNK_OBJECT: &str = "chat.completion.chunk";
pub const START_ID: &str = "chatcmpl-start-message-id";
pub const END_ID: &str = "chatcmpl-end-message-id";

/// Terminal sentinel closing every stitched stream.
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Why the stitched response finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
}

/// Incremental message fields of one chunk. Empty on the end chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<FinishReason>,
}

/// One outbound `chat.completion.chunk`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundEnvelope {
    pub id: String,
    pub model: String,
    pub object: String,
    pub created: i64,
    pub choices: Vec<ChunkChoice>,
}

impl OutboundEnvelope {
    fn with_choice(id: &str, model: &str, created: i64, choice: ChunkChoice) -> Self {
        Self {
            id: id.to_owned(),
            model: model.to_owned(),
            object: CHUNK_OBJECT.to_owned(),
            created,
            choices: vec![choice],
        }
    }

    /// Opening chunk: empty content plus the assistant role.
    pub fn start(model: &str, created: i64) -> Self {
        Self::with_choice(
            START_ID,
            model,
            created,
            ChunkChoice {
                index: 0,
                delta: Delta {
                    content: Some(String::new()),
                    role: Some("assistant".to_owned()),
                },
                finish_reason: None,
            },
        )
    }

    /// A chunk carrying visible text.
    pub fn content(id: &str, model: &str, created: i64, text: impl Into<String>) -> Self {
        Self::with_choice(
            id,
            model,
            created,
            ChunkChoice {
                index: 0,
                delta: Delta {
                    content: Some(text.into()),
                    role: None,
                },
                finish_reason: None,
            },
        )
    }

    /// Closing chunk: empty delta, `finish_reason: "stop"`.
    pub fn end(model: &str, created: i64) -> Self {
        Self::with_choice(
            END_ID,
            model,
            created,
            ChunkChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some(FinishReason::Stop),
            },
        )
    }

    /// Text of the first choice, if any.
    pub fn text(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }

    /// Serialize as one `data: <json>\n\n` frame. Non-ASCII is written as-is.
    pub fn to_sse(&self) -> Result<Bytes> {
        let json = serde_json::to_string(self)?;
        let mut frame = String::with_capacity(json.len() + 8);
        frame.push_str("data: ");
        frame.push_str(&json);
        frame.push_str("\n\n");
        Ok(Bytes::from(frame))
    }
}

//! Per-request stitch state machine.
//!
//! `Start -> ThinkingPhase -> AnswerPhase -> End -> Done`, strictly forward.
//! Every transition is a method that returns what it emits, so each one can
//! be exercised without any I/O.

use bytes::Bytes;
use chrono::Utc;
use strum::Display;

use crate::error::{DeepClaudeError, Result};
use crate::types::{ConversationMessage, Fragment, OutboundEnvelope, DONE_FRAME};

/// Opening of the synthetic assistant message injected before phase 2.
pub const THINKING_PREFIX: &str = "Here's my thinking process:\n\n";
/// Closing of the synthetic assistant message injected before phase 2.
pub const THINKING_SUFFIX: &str = "Based on the thinking process, I will now provide my response:";
/// Visible break emitted between the reasoning and the answer.
pub const PHASE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StitchState {
    Start,
    ThinkingPhase,
    AnswerPhase,
    End,
    Done,
}

/// Working state of one stitched request.
#[derive(Debug)]
pub struct StitchSession {
    state: StitchState,
    model_name: String,
    chunk_id: String,
    created: i64,
    thinking: String,
    messages: Vec<ConversationMessage>,
}

/// Build the assistant message that hands the transcript to the answer model.
pub fn thinking_message(transcript: &str) -> ConversationMessage {
    ConversationMessage::assistant(format!("{THINKING_PREFIX}{transcript}{THINKING_SUFFIX}"))
}

impl StitchSession {
    /// `messages` becomes the session's own working history.
    pub fn new(model_name: impl Into<String>, messages: Vec<ConversationMessage>) -> Self {
        Self {
            state: StitchState::Start,
            model_name: model_name.into(),
            chunk_id: String::new(),
            created: 0,
            thinking: String::new(),
            messages,
        }
    }

    pub fn state(&self) -> StitchState {
        self.state
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Accumulated reasoning transcript so far.
    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    /// Id shared by every content chunk. Empty before [`begin`](Self::begin).
    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    fn require_state(&self, expected: StitchState, action: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DeepClaudeError::InvalidState(format!(
                "cannot {action} in state {}, expected {expected}",
                self.state
            )))
        }
    }

    fn content(&self, text: impl Into<String>) -> OutboundEnvelope {
        OutboundEnvelope::content(&self.chunk_id, &self.model_name, self.created, text)
    }

    /// `Start -> ThinkingPhase`: fix the chunk id and emit the start chunk.
    pub fn begin(&mut self) -> Result<OutboundEnvelope> {
        self.require_state(StitchState::Start, "begin")?;
        let now = Utc::now();
        self.created = now.timestamp();
        self.chunk_id = format!("chatcmpl-{:x}", now.timestamp_millis());
        self.state = StitchState::ThinkingPhase;
        Ok(OutboundEnvelope::start(&self.model_name, self.created))
    }

    /// Re-frame one reasoning-phase fragment. Thinking text is also
    /// appended to the transcript.
    pub fn on_reasoning(&mut self, fragment: Fragment) -> Result<OutboundEnvelope> {
        self.require_state(StitchState::ThinkingPhase, "accept a reasoning fragment")?;
        if fragment.is_thinking() {
            self.thinking.push_str(&fragment.text);
        }
        Ok(self.content(fragment.text))
    }

    /// `ThinkingPhase -> AnswerPhase`: inject the transcript into the
    /// history and emit the separator chunk.
    pub fn finish_reasoning(&mut self) -> Result<OutboundEnvelope> {
        self.require_state(StitchState::ThinkingPhase, "finish reasoning")?;
        self.messages.push(thinking_message(&self.thinking));
        self.state = StitchState::AnswerPhase;
        Ok(self.content(PHASE_SEPARATOR))
    }

    /// Re-frame one answer-phase fragment.
    pub fn on_answer(&mut self, fragment: Fragment) -> Result<OutboundEnvelope> {
        self.require_state(StitchState::AnswerPhase, "accept an answer fragment")?;
        Ok(self.content(fragment.text))
    }

    /// `AnswerPhase -> End`: emit the stop chunk.
    pub fn finish(&mut self) -> Result<OutboundEnvelope> {
        self.require_state(StitchState::AnswerPhase, "finish")?;
        self.state = StitchState::End;
        Ok(OutboundEnvelope::end(&self.model_name, Utc::now().timestamp()))
    }

    /// `End -> Done`: the `[DONE]` sentinel.
    pub fn close(&mut self) -> Result<Bytes> {
        self.require_state(StitchState::End, "close")?;
        self.state = StitchState::Done;
        Ok(Bytes::from_static(DONE_FRAME))
    }
}

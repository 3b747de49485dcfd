//! Streaming types.

use strum::Display;

/// Whether a fragment is reasoning output or final-answer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FragmentKind {
    Thinking,
    Content,
}

impl FragmentKind {
    /// Fragments of the reasoning model are `Thinking`, everything else is
    /// `Content`.
    pub fn for_model(model: &str, reasoning_model: &str) -> Self {
        if model == reasoning_model {
            Self::Thinking
        } else {
            Self::Content
        }
    }
}

/// One non-empty text delta decoded from an upstream stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub text: String,
}

impl Fragment {
    pub fn thinking(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Thinking,
            text: text.into(),
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Content,
            text: text.into(),
        }
    }

    pub fn is_thinking(&self) -> bool {
        self.kind == FragmentKind::Thinking
    }
}

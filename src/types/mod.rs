//! Core types used throughout deepclaude.

pub mod envelope;
pub mod message;
pub mod stream;

pub use envelope::{OutboundEnvelope, DONE_FRAME};
pub use message::ConversationMessage;
pub use stream::{Fragment, FragmentKind};

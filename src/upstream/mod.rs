//! Upstream model calls: HTTP plumbing, SSE decoding and the stream client.

pub mod client;
pub mod decoder;
pub mod http;

pub use client::{ChatRequest, ChatStreamer, FragmentStream, UpstreamClient};
pub use decoder::{fragment_stream, FragmentDecoder, LineBuffer, THINK_END_MARKER};

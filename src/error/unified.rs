//! Error classification shared by the stream engine and the HTTP layer.

use strum::Display;

/// Broad error category used to pick an HTTP status and a log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    /// The inbound request was malformed or incomplete.
    InvalidRequest,
    /// Missing or rejected credentials, inbound or upstream.
    Authentication,
    RateLimit,
    /// Connect failure or a body that broke off mid-stream.
    Network,
    /// Upstream answered 5xx.
    Upstream,
    /// Upstream answered with some other non-success status.
    Api,
    Configuration,
    Serialization,
    /// A stitch session method was called out of order.
    InvalidState,
}

impl ErrorCategory {
    /// HTTP status the endpoint answers with when the error happens before
    /// any SSE bytes were written.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidRequest | Self::Serialization => 400,
            Self::Authentication => 401,
            Self::RateLimit => 429,
            Self::Network | Self::Upstream | Self::Api => 502,
            Self::Configuration | Self::InvalidState => 500,
        }
    }
}

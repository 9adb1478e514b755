use dcintel_core::CoreError;
use thiserror::Error;

/// Which ceiling refused a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ceiling {
    PerMinute,
    PerDay,
}

impl std::fmt::Display for Ceiling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Ceiling::PerMinute => "per-minute",
            Ceiling::PerDay => "per-day",
        })
    }
}

/// Failures that prevent a call from producing any [`RawResponse`].
///
/// Terminal HTTP failures are not errors here: they come back as a
/// `RawResponse` with an error status.
///
/// [`RawResponse`]: dcintel_core::RawResponse
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("validation error: {0}")]
    Validation(#[from] CoreError),

    #[error("rate limit exceeded: {ceiling} budget of {limit} calls exhausted")]
    RateLimitExceeded { ceiling: Ceiling, limit: u32 },
}

/// Network-level failure reported by a [`Transport`](crate::Transport).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Connect(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("HTTP client could not be built: {0}")]
    Client(String),
}

//! Cairn error types

use std::time::Duration;

/// Cairn error types
///
/// All variants are `Clone` because a single chunk failure fans out to every
/// pending request whose coordinates overlapped the chunk.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CairnError {
    /// Connection-level failure below HTTP (refused, DNS, client timeout).
    ///
    /// Surfaced immediately with no retry; the subsystem cannot distinguish
    /// "server down" from "device offline".
    #[error("transport error: {0}")]
    Transport(String),

    #[error("elevation API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// The server rejected the chunk as too large (HTTP 413) even though it
    /// was already capped at the configured chunk size. Recovered by
    /// splitting the pending request set, not surfaced to callers directly.
    #[error("payload too large")]
    PayloadTooLarge,

    #[error("malformed elevation response: {0}")]
    MalformedResponse(String),

    /// Transient failures exceeded the retry budget; every request that was
    /// pending at the time receives this error.
    #[error("elevation fetch abandoned after {attempts} failed attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("configuration error: {0}")]
    Configuration(String),

    /// The service dropped a request's resolution channel without resolving
    /// it. Indicates a bug in the scheduler, not a caller mistake.
    #[error("pending request dropped without resolution")]
    RequestDropped,
}

impl CairnError {
    /// Whether this failure is in the retryable server-overload class.
    ///
    /// Covers rate limiting (429) and the 500/502/503/504 family. Everything
    /// else (transport failures, malformed bodies, other statuses) is
    /// terminal for the affected requests.
    pub fn is_transient(&self) -> bool {
        match self {
            CairnError::RateLimited { .. } => true,
            CairnError::Api { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Server-provided retry hint, if any (from a 429 `retry-after` header).
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CairnError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for cairn operations
pub type Result<T> = std::result::Result<T, CairnError>;

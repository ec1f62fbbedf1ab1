use thiserror::Error;

/// Why a page could not be fetched.
///
/// Retriability is decided by [`crate::retry::is_retriable`]; the variants
/// here only describe what happened.
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// Timeout, connection reset, TLS failure, or an error reading the body.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limited (HTTP 429) on page {page}")]
    RateLimited {
        page: u32,
        retry_after_secs: Option<u64>,
    },

    #[error("server error HTTP {status} on page {page}")]
    Server { status: u16, page: u32 },

    #[error("client error HTTP {status} on page {page}")]
    Client { status: u16, page: u32 },

    #[error("malformed response on page {page}: {reason}")]
    Malformed { page: u32, reason: String },

    #[error("invalid endpoint \"{endpoint}\": {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid proxy \"{proxy}\": {reason}")]
    InvalidProxy { proxy: String, reason: String },
}

impl FetchFailure {
    /// `false` for failures raised before any request went out.
    #[must_use]
    pub fn reached_network(&self) -> bool {
        !matches!(
            self,
            FetchFailure::InvalidEndpoint { .. } | FetchFailure::InvalidProxy { .. }
        )
    }
}

/// Why a single raw record could not become a review.
///
/// Only the record is lost; the rest of its page is still decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeFailure {
    #[error("record on page {page} is not an array")]
    NotAnArray { page: u32 },

    #[error("record on page {page} has no review id")]
    MissingId { page: u32 },
}

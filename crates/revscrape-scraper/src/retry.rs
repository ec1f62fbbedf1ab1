//! Back-off arithmetic and retry classification for page fetches.
//!
//! The retry loop itself lives in [`crate::client::PageFetcher`] because it
//! has to update run counters and rotate the session between attempts. This
//! module holds the pieces that loop is built from:
//!
//! - [`is_retriable`] decides whether a [`FetchFailure`] is worth another try.
//! - [`backoff_delay`] computes `base × 2^attempt`, jittered and capped.
//! - [`Sleeper`] is the single suspension point, swappable in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchFailure;

/// Ceiling on any single back-off sleep.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// A 429 waits this many times longer than a 5xx or transport failure.
pub const RATE_LIMIT_MULTIPLIER: u32 = 2;

/// Malformed bodies get at most this many retries, regardless of `max_retries`.
pub const MALFORMED_RETRY_LIMIT: u32 = 2;

/// Consecutive 5xx answers that make the fetcher rotate the session.
pub const SERVER_ERROR_STREAK: u32 = 3;

/// Returns `true` for failures that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - [`FetchFailure::Transport`]: timeout, connection reset, body read error.
/// - [`FetchFailure::RateLimited`]: HTTP 429 (the caller also rotates the session).
/// - [`FetchFailure::Server`]: HTTP 5xx.
/// - [`FetchFailure::Malformed`]: likely a transient edge response; the caller
///   bounds these separately with [`MALFORMED_RETRY_LIMIT`].
///
/// **Not retriable:**
/// - [`FetchFailure::Client`]: any other 4xx; retrying returns the same answer.
/// - [`FetchFailure::InvalidEndpoint`], [`FetchFailure::InvalidProxy`]:
///   configuration problems.
#[must_use]
pub fn is_retriable(err: &FetchFailure) -> bool {
    match err {
        FetchFailure::Transport(_)
        | FetchFailure::RateLimited { .. }
        | FetchFailure::Server { .. }
        | FetchFailure::Malformed { .. } => true,
        FetchFailure::Client { .. }
        | FetchFailure::InvalidEndpoint { .. }
        | FetchFailure::InvalidProxy { .. } => false,
    }
}

/// Delay before retry number `attempt + 1`.
///
/// Back-off schedule with `base = 1s`, no jitter:
///
/// | Attempt | Sleep before next attempt |
/// |---------|---------------------------|
/// | 0       | 1 s × 2⁰ = 1 s            |
/// | 1       | 1 s × 2¹ = 2 s            |
/// | 2       | 1 s × 2² = 4 s            |
///
/// With `jitter` the result is scaled by a random factor in `[0.75, 1.25)`.
/// The result never exceeds `cap`.
#[must_use]
pub fn backoff_delay(base: Duration, attempt: u32, cap: Duration, jitter: bool) -> Duration {
    let factor = 1u32 << attempt.min(16);
    let computed = base.saturating_mul(factor).min(cap);
    if !jitter || computed.is_zero() {
        return computed;
    }
    let scale = rand::random::<f64>() * 0.5 + 0.75;
    computed.mul_f64(scale).min(cap)
}

/// The one place a fetch suspends for a fixed delay.
///
/// Production code uses [`TokioSleeper`]; tests substitute an implementation
/// that records requested delays without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_is_not_retriable() {
        assert!(!is_retriable(&FetchFailure::Client {
            status: 404,
            page: 1
        }));
    }

    #[test]
    fn invalid_endpoint_is_not_retriable() {
        assert!(!is_retriable(&FetchFailure::InvalidEndpoint {
            endpoint: "nope".to_owned(),
            reason: "relative URL".to_owned(),
        }));
    }

    #[test]
    fn rate_limit_server_and_malformed_are_retriable() {
        assert!(is_retriable(&FetchFailure::RateLimited {
            page: 2,
            retry_after_secs: None
        }));
        assert!(is_retriable(&FetchFailure::Server {
            status: 503,
            page: 2
        }));
        assert!(is_retriable(&FetchFailure::Malformed {
            page: 2,
            reason: "truncated".to_owned()
        }));
    }

    #[tokio::test]
    async fn connect_error_is_retriable() {
        let err = reqwest::Client::new()
            .get("http://0.0.0.0:1")
            .send()
            .await
            .unwrap_err();
        assert!(is_retriable(&FetchFailure::Transport(err)));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 0, MAX_BACKOFF, false), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 1, MAX_BACKOFF, false), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3, MAX_BACKOFF, false), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped() {
        let base = Duration::from_secs(10);
        assert_eq!(backoff_delay(base, 10, MAX_BACKOFF, false), MAX_BACKOFF);
        assert!(backoff_delay(base, 10, MAX_BACKOFF, true) <= MAX_BACKOFF);
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let base = Duration::from_millis(1000);
        for _ in 0..100 {
            let delay = backoff_delay(base, 1, MAX_BACKOFF, true);
            assert!(delay >= Duration::from_millis(1500), "{delay:?}");
            assert!(delay <= Duration::from_millis(2500), "{delay:?}");
        }
    }

    #[test]
    fn zero_base_never_sleeps() {
        assert_eq!(
            backoff_delay(Duration::ZERO, 5, MAX_BACKOFF, true),
            Duration::ZERO
        );
    }
}

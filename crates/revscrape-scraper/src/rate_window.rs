//! Sliding-window request-rate tracking.
//!
//! A [`RateWindow`] remembers when each request was sent during the trailing
//! window and answers two questions: how fast are we going, and how long
//! should the caller wait before the next request. It never sleeps itself.
//!
//! Every method has an `*_at` form taking an explicit [`Instant`] so the
//! arithmetic can be driven by a synthetic clock; the plain forms use
//! [`Instant::now`].
//!
//! One window belongs to one scrape run. Sharing a window across concurrent
//! runs would need a `Mutex` around it, since recording and reading are a
//! read-modify-write of the same log.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default trailing window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Upper bound on the delay [`RateWindow::should_throttle`] will advise.
pub const MAX_THROTTLE_DELAY: Duration = Duration::from_secs(5);

/// Advice returned by [`RateWindow::should_throttle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    pub throttle: bool,
    pub delay: Duration,
}

impl Throttle {
    const NONE: Throttle = Throttle {
        throttle: false,
        delay: Duration::ZERO,
    };
}

#[derive(Debug, Clone)]
pub struct RateWindow {
    window: Duration,
    max_delay: Duration,
    sent: VecDeque<Instant>,
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl RateWindow {
    /// Creates an empty window of the given length (clamped to at least 1 ms).
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.max(Duration::from_millis(1)),
            max_delay: MAX_THROTTLE_DELAY,
            sent: VecDeque::new(),
        }
    }

    /// Overrides the delay cap (default [`MAX_THROTTLE_DELAY`]).
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn record_request(&mut self) {
        self.record_request_at(Instant::now());
    }

    pub fn record_request_at(&mut self, now: Instant) {
        self.prune(now);
        self.sent.push_back(now);
    }

    /// Requests per second over the trailing window.
    #[must_use]
    pub fn current_rate(&self) -> f64 {
        self.current_rate_at(Instant::now())
    }

    #[must_use]
    pub fn current_rate_at(&self, now: Instant) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let count = self.count_in_window(now) as f64;
        count / self.window.as_secs_f64()
    }

    /// Returns whether the caller should wait before sending, and for how long.
    #[must_use]
    pub fn should_throttle(&self, max_rate: f64) -> Throttle {
        self.should_throttle_at(max_rate, Instant::now())
    }

    /// Throttles whenever more than `max_rate * window_secs` requests fall in
    /// the window. The delay is how long until enough of the oldest requests
    /// age out to bring the count back to that allowance, capped.
    #[must_use]
    pub fn should_throttle_at(&self, max_rate: f64, now: Instant) -> Throttle {
        if self.current_rate_at(now) <= max_rate {
            return Throttle::NONE;
        }

        let in_window: Vec<Instant> = self.in_window(now).collect();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let allowed = (max_rate.max(0.0) * self.window.as_secs_f64()).floor() as usize;
        let excess = in_window.len().saturating_sub(allowed);

        // The `excess`-th oldest timestamp has to leave the window.
        let delay = in_window
            .get(excess.saturating_sub(1))
            .map_or(self.max_delay, |oldest| {
                (*oldest + self.window).saturating_duration_since(now)
            })
            .min(self.max_delay);

        Throttle {
            throttle: true,
            delay,
        }
    }

    /// Number of requests currently remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    fn in_window(&self, now: Instant) -> impl Iterator<Item = Instant> + '_ {
        let window = self.window;
        self.sent
            .iter()
            .copied()
            .filter(move |t| now.saturating_duration_since(*t) < window)
    }

    fn count_in_window(&self, now: Instant) -> usize {
        self.in_window(now).count()
    }

    fn prune(&mut self, now: Instant) {
        while self
            .sent
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            self.sent.pop_front();
        }
    }
}

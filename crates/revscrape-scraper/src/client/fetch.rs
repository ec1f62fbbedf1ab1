//! Single-page fetch with throttling, humanization, and retry.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use revscrape_core::ScrapeOptions;

use crate::error::FetchFailure;
use crate::pagination::{parse_page, PageRequest, RawPage, SortOrder};
use crate::rate_window::RateWindow;
use crate::report::ScrapeStats;
use crate::retry::{
    backoff_delay, is_retriable, MALFORMED_RETRY_LIMIT, RATE_LIMIT_MULTIPLIER, SERVER_ERROR_STREAK,
};
use crate::session::{RotationReason, SessionIdentity, SessionRotator};

use super::ReviewScraper;

/// A successfully fetched and parsed page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub records: Vec<Value>,
    pub next_cursor: Option<String>,
    /// Requests it took, including the successful one.
    pub attempts: u32,
}

/// Random pause before a request. Fast mode: 50–250 ms, otherwise
/// 400–1200 ms.
#[must_use]
pub fn humanize_delay(fast_mode: bool) -> Duration {
    let range = if fast_mode { 50..=250 } else { 400..=1200 };
    Duration::from_millis(rand::rng().random_range(range))
}

/// Fetches pages for one run. Owns the run's [`RateWindow`].
pub struct PageFetcher<'a> {
    scraper: &'a ReviewScraper,
    options: &'a ScrapeOptions,
    place_id: &'a str,
    window: RateWindow,
    proxied_clients: HashMap<String, Client>,
    server_error_streak: u32,
}

impl<'a> PageFetcher<'a> {
    #[must_use]
    pub fn new(scraper: &'a ReviewScraper, options: &'a ScrapeOptions, place_id: &'a str) -> Self {
        Self {
            scraper,
            options,
            place_id,
            window: RateWindow::default(),
            proxied_clients: HashMap::new(),
            server_error_streak: 0,
        }
    }

    /// Fetches the page addressed by `cursor`, retrying transient failures.
    ///
    /// A 429 forces a session rotation before the retry. So does a streak of
    /// [`SERVER_ERROR_STREAK`] consecutive 5xx answers. Malformed bodies are
    /// retried at most [`MALFORMED_RETRY_LIMIT`] times.
    ///
    /// # Errors
    ///
    /// Returns the last [`FetchFailure`] once it is not retriable or the
    /// retry budget (`max_retries`) is spent.
    pub async fn fetch(
        &mut self,
        cursor: Option<&str>,
        page_number: u32,
        sessions: &mut SessionRotator,
        stats: &mut ScrapeStats,
    ) -> Result<FetchedPage, FetchFailure> {
        self.fetch_notifying(cursor, page_number, sessions, stats, |_, _| {})
            .await
    }

    /// Same as [`fetch`](Self::fetch), calling `on_retry` with the failure
    /// and the back-off delay before every retry.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn fetch_notifying<F>(
        &mut self,
        cursor: Option<&str>,
        page_number: u32,
        sessions: &mut SessionRotator,
        stats: &mut ScrapeStats,
        mut on_retry: F,
    ) -> Result<FetchedPage, FetchFailure>
    where
        F: FnMut(&FetchFailure, Duration),
    {
        let scraper = self.scraper;
        let config = &scraper.config;
        let max_retries = self.options.max_retries;
        let mut attempt = 0u32;
        let mut malformed_retries = 0u32;

        loop {
            let identity = sessions.current();
            let err = match self.attempt(&identity, cursor, page_number, stats).await {
                Ok(page) => {
                    stats.requests_succeeded += 1;
                    self.server_error_streak = 0;
                    return Ok(FetchedPage {
                        records: page.records,
                        next_cursor: page.next_cursor,
                        attempts: attempt + 1,
                    });
                }
                Err(err) => err,
            };

            if err.reached_network() {
                stats.requests_failed += 1;
            }
            if matches!(err, FetchFailure::RateLimited { .. }) {
                stats.rate_limits_encountered += 1;
            }
            if matches!(err, FetchFailure::Server { .. }) {
                self.server_error_streak += 1;
            } else {
                self.server_error_streak = 0;
            }

            let malformed = matches!(err, FetchFailure::Malformed { .. });
            let retriable = is_retriable(&err)
                && attempt < max_retries
                && !(malformed && malformed_retries >= MALFORMED_RETRY_LIMIT);
            if !retriable {
                tracing::warn!(
                    place_id = %self.place_id,
                    page = page_number,
                    attempts = attempt + 1,
                    error = %err,
                    "page fetch failed terminally"
                );
                return Err(err);
            }

            let delay = match &err {
                FetchFailure::RateLimited {
                    retry_after_secs, ..
                } => {
                    let computed = backoff_delay(
                        config.backoff_base.saturating_mul(RATE_LIMIT_MULTIPLIER),
                        attempt,
                        config.backoff_cap,
                        config.jitter,
                    );
                    let hinted = retry_after_secs
                        .map(Duration::from_secs)
                        .filter(|d| *d <= config.backoff_cap)
                        .unwrap_or_default();
                    computed.max(hinted)
                }
                _ => backoff_delay(config.backoff_base, attempt, config.backoff_cap, config.jitter),
            };

            match &err {
                FetchFailure::RateLimited { .. } => {
                    sessions.rotate(RotationReason::RateLimited);
                }
                FetchFailure::Server { .. } if self.server_error_streak >= SERVER_ERROR_STREAK => {
                    sessions.rotate(RotationReason::ServerErrorStreak);
                    self.server_error_streak = 0;
                }
                FetchFailure::Malformed { .. } => malformed_retries += 1,
                _ => {}
            }

            stats.retries_used += 1;
            tracing::warn!(
                place_id = %self.place_id,
                page = page_number,
                attempt = attempt + 1,
                max_retries,
                ?delay,
                error = %err,
                "retrying page fetch after backoff"
            );
            on_retry(&err, delay);
            config.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    /// One request: throttle, humanize, send, classify.
    async fn attempt(
        &mut self,
        identity: &SessionIdentity,
        cursor: Option<&str>,
        page_number: u32,
        stats: &mut ScrapeStats,
    ) -> Result<RawPage, FetchFailure> {
        let scraper = self.scraper;
        let config = &scraper.config;
        let url = PageRequest {
            place_id: self.place_id,
            page_size: self.options.page_size,
            cursor,
            sort: SortOrder::from_newest(self.options.sort_by_newest),
            language: identity.language(),
            region: identity.region(),
            session_id: identity.session_id(),
        }
        .url(&config.endpoint)?;
        let client = self.client_for(identity)?;

        let throttle = self.window.should_throttle(self.options.max_request_rate);
        if throttle.throttle {
            tracing::debug!(
                page = page_number,
                delay = ?throttle.delay,
                rate = self.window.current_rate(),
                "throttling before request"
            );
            config.sleeper.sleep(throttle.delay).await;
        }
        if config.humanize {
            config
                .sleeper
                .sleep(humanize_delay(self.options.fast_mode))
                .await;
        }

        self.window.record_request();
        stats.requests_sent += 1;
        tracing::debug!(
            place_id = %self.place_id,
            page = page_number,
            session = %identity.session_id(),
            "requesting page"
        );

        let response = client
            .get(url)
            .headers(identity.headers().clone())
            .timeout(Duration::from_secs(self.options.request_timeout_secs))
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            return Err(FetchFailure::RateLimited {
                page: page_number,
                retry_after_secs,
            });
        }
        if status.is_server_error() {
            return Err(FetchFailure::Server {
                status: status.as_u16(),
                page: page_number,
            });
        }
        if !status.is_success() {
            return Err(FetchFailure::Client {
                status: status.as_u16(),
                page: page_number,
            });
        }

        let body = response.text().await?;
        parse_page(&body).map_err(|reason| FetchFailure::Malformed {
            page: page_number,
            reason,
        })
    }

    /// The shared client, or a cached client routed through the identity's
    /// proxy.
    fn client_for(&mut self, identity: &SessionIdentity) -> Result<Client, FetchFailure> {
        let Some(proxy) = identity.proxy() else {
            return Ok(self.scraper.client.clone());
        };
        if let Some(client) = self.proxied_clients.get(proxy) {
            return Ok(client.clone());
        }

        let invalid = |e: reqwest::Error| FetchFailure::InvalidProxy {
            proxy: proxy.to_owned(),
            reason: e.to_string(),
        };
        let client = Client::builder()
            .proxy(reqwest::Proxy::all(proxy).map_err(invalid)?)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(invalid)?;
        self.proxied_clients.insert(proxy.to_owned(), client.clone());
        Ok(client)
    }
}

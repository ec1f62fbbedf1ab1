//! HTTP client for the paginated review endpoint.

mod fetch;
mod run;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;

use revscrape_core::AppConfig;

use crate::error::FetchFailure;
use crate::retry::{Sleeper, TokioSleeper, MAX_BACKOFF};

pub use fetch::{humanize_delay, FetchedPage, PageFetcher};
pub use run::ScrapeRunState;

/// Default base delay for exponential backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Connection-level settings shared by every run of one [`ReviewScraper`].
#[derive(Clone)]
pub struct FetchConfig {
    pub endpoint: String,
    /// Base delay for `base × 2^attempt`; 429s use twice this.
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Scale each backoff by a random factor in `[0.75, 1.25)`.
    pub jitter: bool,
    /// Sleep a short random interval before every request.
    pub humanize: bool,
    pub sleeper: Arc<dyn Sleeper>,
}

impl FetchConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_cap: MAX_BACKOFF,
            jitter: true,
            humanize: true,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.endpoint.clone())
            .with_backoff_base(Duration::from_millis(config.backoff_base_ms))
    }

    #[must_use]
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    #[must_use]
    pub fn without_humanize(mut self) -> Self {
        self.humanize = false;
        self
    }
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("endpoint", &self.endpoint)
            .field("backoff_base", &self.backoff_base)
            .field("backoff_cap", &self.backoff_cap)
            .field("jitter", &self.jitter)
            .field("humanize", &self.humanize)
            .finish_non_exhaustive()
    }
}

/// Entry point for scraping reviews.
///
/// Cheap to share between concurrent runs: the underlying `reqwest::Client`
/// is reference counted, and every call to [`ReviewScraper::scrape`]
/// allocates its own rate window, session rotator, and run state.
#[derive(Debug, Clone)]
pub struct ReviewScraper {
    pub(super) client: Client,
    pub(super) config: FetchConfig,
    /// Fixed "today" for date windows; `None` means the current UTC date.
    pub(super) today: Option<NaiveDate>,
}

impl ReviewScraper {
    /// # Errors
    ///
    /// Returns [`FetchFailure::Transport`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn new(config: FetchConfig) -> Result<Self, FetchFailure> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            config,
            today: None,
        })
    }

    /// Pins the date that relative date windows count back from.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub(super) fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

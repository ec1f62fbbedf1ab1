use std::path::PathBuf;

use crate::options::ScrapeOptions;

/// Process-wide settings read from `REVSCRAPE_*` variables.
#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub endpoint: String,
    pub output_dir: PathBuf,
    pub backoff_base_ms: u64,
    pub max_concurrent_runs: usize,
    /// Defaults applied to every run before per-place overrides.
    pub scrape: ScrapeOptions,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("endpoint", &self.endpoint)
            .field("output_dir", &self.output_dir)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("max_concurrent_runs", &self.max_concurrent_runs)
            .field("language", &self.scrape.language)
            .field("region", &self.scrape.region)
            .field("max_retries", &self.scrape.max_retries)
            .field("max_request_rate", &self.scrape.max_request_rate)
            .field(
                "proxy_list",
                &format!("[{} redacted]", self.scrape.proxy_list.len()),
            )
            .finish_non_exhaustive()
    }
}

use crate::app_config::AppConfig;
use crate::options::ScrapeOptions;
use crate::ConfigError;

/// Endpoint used when `REVSCRAPE_ENDPOINT` is not set.
pub const DEFAULT_ENDPOINT: &str = "https://www.google.com/maps/rpc/listugcposts";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable is optional; defaults mirror [`ScrapeOptions::default`].
/// The resulting scrape defaults are validated before returning.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;
    use std::str::FromStr;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    fn parse_var<T>(var: &str, raw: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    }

    let defaults = ScrapeOptions::default();

    let log_level = or_default("REVSCRAPE_LOG_LEVEL", "info");
    let endpoint = or_default("REVSCRAPE_ENDPOINT", DEFAULT_ENDPOINT);
    let output_dir = PathBuf::from(or_default("REVSCRAPE_OUTPUT_DIR", "./output"));

    let backoff_base_ms = parse_var::<u64>(
        "REVSCRAPE_BACKOFF_BASE_MS",
        &or_default("REVSCRAPE_BACKOFF_BASE_MS", "2000"),
    )?;
    let max_concurrent_runs = parse_var::<usize>(
        "REVSCRAPE_MAX_CONCURRENT_RUNS",
        &or_default("REVSCRAPE_MAX_CONCURRENT_RUNS", "2"),
    )?;

    let language = or_default("REVSCRAPE_LANGUAGE", &defaults.language);
    let region = or_default("REVSCRAPE_REGION", &defaults.region);
    let request_timeout_secs = parse_var::<u64>(
        "REVSCRAPE_REQUEST_TIMEOUT_SECS",
        &or_default(
            "REVSCRAPE_REQUEST_TIMEOUT_SECS",
            &defaults.request_timeout_secs.to_string(),
        ),
    )?;
    let max_retries = parse_var::<u32>(
        "REVSCRAPE_MAX_RETRIES",
        &or_default("REVSCRAPE_MAX_RETRIES", &defaults.max_retries.to_string()),
    )?;
    let max_request_rate = parse_var::<f64>(
        "REVSCRAPE_MAX_REQUEST_RATE",
        &or_default(
            "REVSCRAPE_MAX_REQUEST_RATE",
            &defaults.max_request_rate.to_string(),
        ),
    )?;
    let fast_mode = parse_var::<bool>(
        "REVSCRAPE_FAST_MODE",
        &or_default("REVSCRAPE_FAST_MODE", "false"),
    )?;
    let page_size = parse_var::<u32>(
        "REVSCRAPE_PAGE_SIZE",
        &or_default("REVSCRAPE_PAGE_SIZE", &defaults.page_size.to_string()),
    )?;
    let max_pages = parse_var::<u32>(
        "REVSCRAPE_MAX_PAGES",
        &or_default("REVSCRAPE_MAX_PAGES", &defaults.max_pages.to_string()),
    )?;
    let proxy_list = parse_proxy_list(&or_default("REVSCRAPE_PROXIES", ""));

    let scrape = ScrapeOptions {
        language,
        region,
        fast_mode,
        max_request_rate,
        request_timeout_secs,
        max_retries,
        use_proxy: !proxy_list.is_empty(),
        proxy_list,
        page_size,
        max_pages,
        ..defaults
    };
    scrape.validate()?;

    Ok(AppConfig {
        log_level,
        endpoint,
        output_dir,
        backoff_base_ms,
        max_concurrent_runs,
        scrape,
    })
}

/// Splits a comma-separated proxy list, dropping blanks.
fn parse_proxy_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

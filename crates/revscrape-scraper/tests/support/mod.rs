//! Shared fixtures for the wiremock-backed integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::{Match, MockServer, Request};

use revscrape_core::ScrapeOptions;
use revscrape_scraper::{FetchConfig, ReviewScraper, Sleeper};

pub const RPC_PATH: &str = "/rpc/listugcposts";
pub const PLACE_ID: &str = "0x89c25a:0x3b2f1e";

/// Matches requests whose `pb` carries the given page cursor. The empty
/// string matches the first page.
pub struct PageToken(String);

impl Match for PageToken {
    fn matches(&self, request: &Request) -> bool {
        let needle = format!("!2s{}!3e", self.0);
        request
            .url
            .query_pairs()
            .any(|(key, value)| key == "pb" && value.contains(&needle))
    }
}

pub fn page_token(token: &str) -> PageToken {
    PageToken(token.to_owned())
}

/// Cursor the fixture endpoint hands out for page `n` (n ≥ 2).
pub fn token_for(page: u32) -> String {
    format!("tok-{page}")
}

/// Records every requested sleep and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }
}

/// A scraper pointed at `server` that never really sleeps: humanization
/// and jitter are off and every back-off is recorded instead.
pub fn test_scraper(server: &MockServer) -> (ReviewScraper, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let config = FetchConfig::new(format!("{}{RPC_PATH}", server.uri()))
        .with_backoff_base(Duration::from_secs(1))
        .with_sleeper(sleeper.clone())
        .without_jitter()
        .without_humanize();
    let scraper = ReviewScraper::new(config)
        .expect("failed to build test scraper")
        .with_today(chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    (scraper, sleeper)
}

pub fn test_options() -> ScrapeOptions {
    ScrapeOptions {
        request_timeout_secs: 5,
        max_retries: 3,
        max_request_rate: 100.0,
        ..ScrapeOptions::default()
    }
}

/// One raw record in the current positional layout.
pub fn review_record(id: &str, text: &str, date: Option<(i32, u32, u32)>) -> Value {
    let mut meta = vec![Value::Null; 7];
    meta[4] = json!([null, null, null, null, null, [format!("Author {id}"), null, ["https://contrib/x"], null, null, 3]]);
    meta[6] = json!("a while ago");

    let mut content = vec![Value::Null; 16];
    content[0] = json!([5]);
    content[15] = json!([[text]]);
    if let Some((y, m, d)) = date {
        content.resize(22, Value::Null);
        content[21] = json!([[], [], [], [], [], [], [null, null, null, null, null, null, null, null, [y, m, d]]]);
    }
    json!([[id, meta, content]])
}

/// A response body: `)]}'` prefix, then `[null, cursor, records]`.
pub fn page_body(records: Vec<Value>, next: Option<&str>) -> String {
    format!(")]}}'\n{}", json!([null, next, records]))
}

/// Page `page` with `count` English reviews whose ids are `p{page}-r{i}`.
pub fn numbered_page(page: u32, count: usize, next: Option<&str>) -> String {
    let records = (0..count)
        .map(|i| review_record(&format!("p{page}-r{i}"), "Friendly staff and good food", None))
        .collect();
    page_body(records, next)
}

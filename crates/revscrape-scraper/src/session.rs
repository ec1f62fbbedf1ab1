//! Session identities and when to replace them.
//!
//! A [`SessionIdentity`] is the coherent set of headers and cookies one
//! logical client would send: a user agent, an `Accept-Language` that matches
//! the requested language and region, and cookies that pin both. Identities
//! are immutable; [`SessionRotator::rotate`] swaps in a freshly generated one
//! so a request can never go out with a half-updated identity.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36 Edg/125.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
];

/// Why a session identity was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    /// Page-count or age threshold reached.
    Scheduled,
    /// The endpoint answered 429.
    RateLimited,
    /// Several 5xx answers in a row. A single 5xx never rotates.
    ServerErrorStreak,
    /// The language-consistency check saw mixed scripts on one page.
    SessionDegraded,
}

impl std::fmt::Display for RotationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationReason::Scheduled => write!(f, "scheduled"),
            RotationReason::RateLimited => write!(f, "rate_limited"),
            RotationReason::ServerErrorStreak => write!(f, "server_error_streak"),
            RotationReason::SessionDegraded => write!(f, "session_degraded"),
        }
    }
}

/// Immutable snapshot of one browsing session.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    session_id: String,
    language: String,
    region: String,
    user_agent: String,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    proxy: Option<String>,
    created_at: Instant,
}

impl SessionIdentity {
    /// Builds a new identity for `language`/`region` with a randomized
    /// fingerprint and, optionally, a proxy to route through.
    #[must_use]
    pub fn create(language: &str, region: &str, proxy: Option<String>) -> Self {
        let mut rng = rand::rng();
        let language = sanitize_tag(language).to_lowercase();
        let region = sanitize_tag(region).to_lowercase();
        let session_id = uuid::Uuid::new_v4().simple().to_string();
        let user_agent = (*USER_AGENTS.choose(&mut rng).unwrap_or(&USER_AGENTS[0])).to_owned();

        let accept_language = accept_language(&language, &region, rng.random_bool(0.5));
        let cookies = vec![
            ("PREF".to_owned(), format!("hl={language}&gl={region}")),
            (
                "CONSENT".to_owned(),
                format!("YES+cb.{}+{language}+{}", rng.random_range(100..1000), region.to_uppercase()),
            ),
            ("SID".to_owned(), session_id.clone()),
        ];

        let mut headers = HeaderMap::new();
        let entries: [(HeaderName, String); 6] = [
            (reqwest::header::USER_AGENT, user_agent.clone()),
            (reqwest::header::ACCEPT_LANGUAGE, accept_language),
            (reqwest::header::ACCEPT, "*/*".to_owned()),
            (reqwest::header::REFERER, "https://www.google.com/".to_owned()),
            (reqwest::header::CACHE_CONTROL, "no-cache".to_owned()),
            (reqwest::header::COOKIE, cookie_header(&cookies)),
        ];
        for (name, value) in entries {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.insert(name, value);
                }
                Err(e) => {
                    tracing::warn!(header = %name, error = %e, "dropping unencodable session header");
                }
            }
        }

        Self {
            session_id,
            language,
            region,
            user_agent,
            headers,
            cookies,
            proxy,
            created_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// All headers to send, including `Cookie`.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Keeps only characters that are safe inside header and cookie values.
fn sanitize_tag(tag: &str) -> String {
    tag.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

fn accept_language(language: &str, region: &str, english_first: bool) -> String {
    let primary = format!("{language}-{}", region.to_uppercase());
    let mut secondary = vec![language.to_owned()];
    if language != "en" {
        secondary.push("en".to_owned());
        if english_first {
            secondary.reverse();
        }
    }
    let mut parts = vec![primary];
    for (i, tag) in secondary.iter().enumerate() {
        let q = 9 - u8::try_from(i).unwrap_or(8).min(8);
        parts.push(format!("{tag};q=0.{q}"));
    }
    parts.join(",")
}

fn cookie_header(cookies: &[(String, String)]) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Thresholds for scheduled rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_pages: u32,
    pub max_age: Duration,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_pages: 50,
            max_age: Duration::from_secs(1800),
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn should_rotate(&self, pages_since_rotation: u32, age: Duration, forced: bool) -> bool {
        forced || pages_since_rotation >= self.max_pages || age >= self.max_age
    }
}

/// Owns the current identity for one scrape run and replaces it on demand.
///
/// When a proxy pool is configured, each new identity takes the next proxy
/// in round-robin order.
#[derive(Debug)]
pub struct SessionRotator {
    language: String,
    region: String,
    proxies: Vec<String>,
    next_proxy: usize,
    policy: RotationPolicy,
    current: Arc<SessionIdentity>,
    pages_since_rotation: u32,
    rotations: u32,
}

impl SessionRotator {
    #[must_use]
    pub fn new(language: &str, region: &str, proxies: Vec<String>, policy: RotationPolicy) -> Self {
        let first = SessionIdentity::create(language, region, proxies.first().cloned());
        Self {
            language: language.to_owned(),
            region: region.to_owned(),
            next_proxy: usize::from(!proxies.is_empty()),
            proxies,
            policy,
            current: Arc::new(first),
            pages_since_rotation: 0,
            rotations: 0,
        }
    }

    #[must_use]
    pub fn current(&self) -> Arc<SessionIdentity> {
        Arc::clone(&self.current)
    }

    /// Counts one successfully fetched page against the current identity.
    pub fn note_page(&mut self) {
        self.pages_since_rotation = self.pages_since_rotation.saturating_add(1);
    }

    #[must_use]
    pub fn pages_since_rotation(&self) -> u32 {
        self.pages_since_rotation
    }

    /// Whether the page-count or age threshold has been reached.
    #[must_use]
    pub fn rotation_due(&self) -> bool {
        self.policy
            .should_rotate(self.pages_since_rotation, self.current.age(), false)
    }

    /// Discards the current identity and installs a new one.
    pub fn rotate(&mut self, reason: RotationReason) -> Arc<SessionIdentity> {
        let previous = self.current.session_id().to_owned();
        self.current = Arc::new(self.build_identity());
        self.pages_since_rotation = 0;
        self.rotations = self.rotations.saturating_add(1);
        tracing::info!(
            %reason,
            previous_session = %previous,
            session = %self.current.session_id(),
            rotations = self.rotations,
            "rotated session identity"
        );
        Arc::clone(&self.current)
    }

    #[must_use]
    pub fn rotations(&self) -> u32 {
        self.rotations
    }

    fn build_identity(&mut self) -> SessionIdentity {
        let proxy = if self.proxies.is_empty() {
            None
        } else {
            let proxy = self.proxies[self.next_proxy % self.proxies.len()].clone();
            self.next_proxy = self.next_proxy.wrapping_add(1);
            Some(proxy)
        };
        SessionIdentity::create(&self.language, &self.region, proxy)
    }
}

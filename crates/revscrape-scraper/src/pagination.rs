//! Request encoding and response envelope handling for the review endpoint.
//!
//! ## Request
//!
//! ```text
//! GET <endpoint>?lang=en&region=us&pb=<pb>
//! pb = !1m2!1y{place}!2m2!1i{page_size}!2s{cursor}!3e{sort}!5m2!1s{session}!7e81
//! ```
//!
//! `!` separates `pb` fields, so `!` and `%` inside any value are
//! percent-encoded before the whole query is URL-encoded.
//!
//! ## Response
//!
//! ```text
//! )]}'
//! [null, "next-cursor", [record, record, ...]]
//! ```
//!
//! The `)]}'` anti-JSON-hijacking prefix is optional. Index 1 is the
//! continuation cursor (`null` or `""` on the last page); index 2 holds the
//! raw records.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Url;
use serde_json::Value;

use crate::error::FetchFailure;

/// Prefix the endpoint puts in front of every JSON body.
pub const XSSI_PREFIX: &str = ")]}'";

const PB_VALUE: &AsciiSet = &CONTROLS.add(b'!').add(b'%');

/// Sort codes understood by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Relevant = 1,
    Newest = 2,
}

impl SortOrder {
    #[must_use]
    pub fn from_newest(sort_by_newest: bool) -> Self {
        if sort_by_newest {
            SortOrder::Newest
        } else {
            SortOrder::Relevant
        }
    }
}

/// Everything needed to address one page.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub place_id: &'a str,
    pub page_size: u32,
    pub cursor: Option<&'a str>,
    pub sort: SortOrder,
    pub language: &'a str,
    pub region: &'a str,
    pub session_id: &'a str,
}

impl PageRequest<'_> {
    /// The `pb` query value.
    #[must_use]
    pub fn pb(&self) -> String {
        format!(
            "!1m2!1y{place}!2m2!1i{size}!2s{cursor}!3e{sort}!5m2!1s{session}!7e81",
            place = escape(self.place_id),
            size = self.page_size,
            cursor = escape(self.cursor.unwrap_or_default()),
            sort = self.sort as u8,
            session = escape(self.session_id),
        )
    }

    /// Full request URL under `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailure::InvalidEndpoint`] if `endpoint` is not an
    /// absolute http(s) URL.
    pub fn url(&self, endpoint: &str) -> Result<Url, FetchFailure> {
        let mut url = Url::parse(endpoint).map_err(|e| FetchFailure::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchFailure::InvalidEndpoint {
                endpoint: endpoint.to_owned(),
                reason: format!("unsupported scheme \"{}\"", url.scheme()),
            });
        }
        url.query_pairs_mut()
            .append_pair("lang", self.language)
            .append_pair("region", self.region)
            .append_pair("pb", &self.pb());
        Ok(url)
    }
}

fn escape(value: &str) -> String {
    utf8_percent_encode(value, PB_VALUE).to_string()
}

/// One decoded response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    pub records: Vec<Value>,
    pub next_cursor: Option<String>,
}

/// Strips the prefix and splits a body into cursor and records.
///
/// # Errors
///
/// Returns a human-readable reason when the body is not JSON, is not a
/// top-level array, or carries a non-array record slot. The caller wraps it
/// into [`FetchFailure::Malformed`].
pub fn parse_page(body: &str) -> Result<RawPage, String> {
    let trimmed = body.trim_start();
    let json = trimmed.strip_prefix(XSSI_PREFIX).unwrap_or(trimmed);
    if json.trim().is_empty() {
        return Err("empty body".to_owned());
    }

    let root: Value = serde_json::from_str(json).map_err(|e| format!("invalid JSON: {e}"))?;
    let envelope = root
        .as_array()
        .ok_or_else(|| "top-level value is not an array".to_owned())?;

    let next_cursor = envelope
        .get(1)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned);

    let records = match envelope.get(2) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(records)) => records.clone(),
        Some(other) => {
            return Err(format!("record slot is {}, expected an array", kind(other)));
        }
    };

    Ok(RawPage {
        records,
        next_cursor,
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

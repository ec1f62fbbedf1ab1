//! Review date extraction.
//!
//! The date is the least stable part of the payload, so it gets its own
//! ladder of strategies, tried in order:
//!
//! 1. structured `[y, m, d]` at the primary path;
//! 2. the same array under the first few siblings of its container;
//! 3. a secondary path for the structured array;
//! 4. an absolute timestamp, kept alongside the relative text;
//! 5. nothing: both fields become [`UNKNOWN_DATE`].
//!
//! Relative text ("3 weeks ago") is never turned into an absolute date.

use chrono::{DateTime, Datelike, NaiveDate};
use serde_json::Value;

use revscrape_core::review::{DATE_FORMAT, UNKNOWN_DATE};

use crate::paths::{as_date_parts, as_int, as_text, fields, first_match};

/// Which strategy produced the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    Primary,
    Sibling,
    Secondary,
    Timestamp,
    RelativeOnly,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDate {
    pub formatted: String,
    pub relative: String,
    pub source: DateSource,
}

/// Runs the five-tier date ladder against one raw record.
#[must_use]
pub fn extract_date(record: &Value) -> ExtractedDate {
    let relative = first_match(record, fields::DATE_RELATIVE, as_text);

    let structured = [
        (fields::DATE_PRIMARY, DateSource::Primary),
        (fields::DATE_SIBLINGS, DateSource::Sibling),
        (fields::DATE_SECONDARY, DateSource::Secondary),
    ]
    .into_iter()
    .find_map(|(path, source)| {
        path.resolve(record)
            .into_iter()
            .find_map(as_date_parts)
            .map(|date| (date, source))
    });

    if let Some((date, source)) = structured {
        return ExtractedDate {
            formatted: format_date(date),
            relative: relative.unwrap_or_default(),
            source,
        };
    }

    let timestamp = first_match(record, fields::DATE_TIMESTAMP, |v| {
        as_int(v).and_then(date_from_timestamp)
    });

    match (timestamp, relative) {
        (Some(date), relative) => ExtractedDate {
            formatted: format_date(date),
            relative: relative.unwrap_or_default(),
            source: DateSource::Timestamp,
        },
        (None, Some(relative)) => ExtractedDate {
            formatted: UNKNOWN_DATE.to_owned(),
            relative,
            source: DateSource::RelativeOnly,
        },
        (None, None) => ExtractedDate {
            formatted: UNKNOWN_DATE.to_owned(),
            relative: UNKNOWN_DATE.to_owned(),
            source: DateSource::Unknown,
        },
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Interprets an epoch timestamp whose unit is inferred from its magnitude
/// (µs, ms, or s). Dates outside 2000..=2100 are rejected.
#[must_use]
pub fn date_from_timestamp(raw: i64) -> Option<NaiveDate> {
    if raw <= 0 {
        return None;
    }
    let datetime = if raw >= 100_000_000_000_000 {
        DateTime::from_timestamp_micros(raw)
    } else if raw >= 100_000_000_000 {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }?;
    let date = datetime.date_naive();
    (2000..=2100).contains(&date.year()).then_some(date)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Builds a record with only the date-bearing slots populated.
    fn record(
        primary_container: Value,
        secondary: Option<Value>,
        timestamp: Option<i64>,
        relative: Option<&str>,
    ) -> Value {
        let mut meta = vec![Value::Null; 22];
        if let Some(ts) = timestamp {
            meta[2] = json!(ts);
        }
        if let Some(rel) = relative {
            meta[6] = json!(rel);
        }
        if let Some(sec) = secondary {
            let mut holder = vec![Value::Null; 7];
            let mut inner = vec![Value::Null; 9];
            inner[8] = sec;
            holder[6] = Value::Array(inner);
            meta[21] = Value::Array(holder);
        }
        let mut content = vec![Value::Null; 22];
        content[21] = primary_container;
        json!([["id-1", meta, content]])
    }

    fn slot(date: Value) -> Value {
        let mut inner = vec![Value::Null; 9];
        inner[8] = date;
        Value::Array(inner)
    }

    fn container_with(index: usize, date: Value) -> Value {
        let mut children = vec![json!([]); 7];
        children[index] = slot(date);
        Value::Array(children)
    }

    #[test]
    fn tier_one_primary_structured_date() {
        let r = record(
            container_with(6, json!([2024, 3, 9, 10])),
            None,
            None,
            Some("a month ago"),
        );
        let d = extract_date(&r);
        assert_eq!(d.formatted, "09/03/2024");
        assert_eq!(d.relative, "a month ago");
        assert_eq!(d.source, DateSource::Primary);
    }

    #[test]
    fn tier_two_finds_shifted_sibling() {
        let r = record(container_with(2, json!([2023, 12, 1])), None, None, None);
        let d = extract_date(&r);
        assert_eq!(d.formatted, "01/12/2023");
        assert_eq!(d.source, DateSource::Sibling);
        assert_eq!(d.relative, "");
    }

    #[test]
    fn tier_two_ignores_siblings_beyond_n() {
        let r = record(
            container_with(5, json!([2023, 12, 1])),
            None,
            None,
            Some("last year"),
        );
        assert_eq!(extract_date(&r).source, DateSource::RelativeOnly);
    }

    #[test]
    fn implausible_primary_falls_through_to_secondary() {
        let r = record(
            container_with(6, json!([1970, 1, 1])),
            Some(json!([2022, 7, 4])),
            None,
            None,
        );
        let d = extract_date(&r);
        assert_eq!(d.formatted, "04/07/2022");
        assert_eq!(d.source, DateSource::Secondary);
    }

    #[test]
    fn tier_four_uses_microsecond_timestamp() {
        // 2024-01-15T12:00:00Z
        let r = record(json!([]), None, Some(1_705_320_000_000_000), Some("9 months ago"));
        let d = extract_date(&r);
        assert_eq!(d.formatted, "15/01/2024");
        assert_eq!(d.relative, "9 months ago");
        assert_eq!(d.source, DateSource::Timestamp);
    }

    #[test]
    fn relative_text_alone_never_produces_a_date() {
        let r = record(json!([]), None, None, Some("2 weeks ago"));
        let d = extract_date(&r);
        assert_eq!(d.formatted, UNKNOWN_DATE);
        assert_eq!(d.relative, "2 weeks ago");
        assert_eq!(d.source, DateSource::RelativeOnly);
    }

    #[test]
    fn nothing_decodes_to_unknown_in_both_fields() {
        let d = extract_date(&json!([["id-only"]]));
        assert_eq!(d.formatted, UNKNOWN_DATE);
        assert_eq!(d.relative, UNKNOWN_DATE);
        assert_eq!(d.source, DateSource::Unknown);
    }

    #[test]
    fn timestamp_units_are_inferred() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(date_from_timestamp(1_705_320_000), expected);
        assert_eq!(date_from_timestamp(1_705_320_000_000), expected);
        assert_eq!(date_from_timestamp(1_705_320_000_000_000), expected);
    }

    #[test]
    fn out_of_range_timestamp_is_rejected() {
        assert!(date_from_timestamp(0).is_none());
        assert!(date_from_timestamp(-5).is_none());
        assert!(date_from_timestamp(86_400).is_none(), "1970 is implausible");
    }
}

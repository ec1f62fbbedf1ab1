//! Per-run scrape options and the requested date window.

use std::str::FromStr;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// The date window a caller asked for.
///
/// Preset variants count back from "today" (inclusive); `Custom` is an
/// inclusive `[start, end]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateRange {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    ThreeYears,
    FiveYears,
    SevenYears,
    #[default]
    All,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl DateRange {
    fn months_back(self) -> Option<u32> {
        match self {
            DateRange::OneMonth => Some(1),
            DateRange::ThreeMonths => Some(3),
            DateRange::SixMonths => Some(6),
            DateRange::OneYear => Some(12),
            DateRange::TwoYears => Some(24),
            DateRange::ThreeYears => Some(36),
            DateRange::FiveYears => Some(60),
            DateRange::SevenYears => Some(84),
            DateRange::All | DateRange::Custom { .. } => None,
        }
    }

    /// Returns `true` when this range places no restriction on dates.
    #[must_use]
    pub fn is_unrestricted(self) -> bool {
        self == DateRange::All
    }

    /// Returns the inclusive `(start, end)` bounds relative to `today`.
    /// `None` on either side means unbounded.
    #[must_use]
    pub fn bounds(self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match self {
            DateRange::All => (None, None),
            DateRange::Custom { start, end } => (Some(start), Some(end)),
            preset => {
                let cutoff = preset
                    .months_back()
                    .and_then(|m| today.checked_sub_months(Months::new(m)));
                (cutoff, None)
            }
        }
    }

    /// Returns `true` if `date` falls inside the window computed against `today`.
    #[must_use]
    pub fn contains(self, date: NaiveDate, today: NaiveDate) -> bool {
        let (start, end) = self.bounds(today);
        start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
    }
}

impl FromStr for DateRange {
    type Err = ConfigError;

    /// Accepts `1month`, `3months`, `6months`, `1year`, `2years`, `3years`,
    /// `5years`, `7years`, `all`, or `YYYY-MM-DD..YYYY-MM-DD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let range = match normalized.as_str() {
            "1month" => DateRange::OneMonth,
            "3months" => DateRange::ThreeMonths,
            "6months" => DateRange::SixMonths,
            "1year" => DateRange::OneYear,
            "2years" => DateRange::TwoYears,
            "3years" => DateRange::ThreeYears,
            "5years" => DateRange::FiveYears,
            "7years" => DateRange::SevenYears,
            "all" | "" => DateRange::All,
            custom => {
                let (start, end) = custom
                    .split_once("..")
                    .ok_or_else(|| ConfigError::InvalidDateRange(s.to_owned()))?;
                let parse = |v: &str| {
                    NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                        .map_err(|_| ConfigError::InvalidDateRange(s.to_owned()))
                };
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(ConfigError::InvalidDateRange(s.to_owned()));
                }
                DateRange::Custom { start, end }
            }
        };
        Ok(range)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateRange::OneMonth => write!(f, "1month"),
            DateRange::ThreeMonths => write!(f, "3months"),
            DateRange::SixMonths => write!(f, "6months"),
            DateRange::OneYear => write!(f, "1year"),
            DateRange::TwoYears => write!(f, "2years"),
            DateRange::ThreeYears => write!(f, "3years"),
            DateRange::FiveYears => write!(f, "5years"),
            DateRange::SevenYears => write!(f, "7years"),
            DateRange::All => write!(f, "all"),
            DateRange::Custom { start, end } => write!(f, "{start}..{end}"),
        }
    }
}

impl TryFrom<String> for DateRange {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateRange> for String {
    fn from(value: DateRange) -> Self {
        value.to_string()
    }
}

/// Options recognized by a single scrape run.
///
/// Every field has a default so a places file can override only what it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ScrapeOptions {
    /// `None` means unbounded.
    pub max_results: Option<usize>,
    pub date_range: DateRange,
    pub sort_by_newest: bool,
    pub language: String,
    pub region: String,
    /// Shorter humanization delays between requests.
    pub fast_mode: bool,
    /// Requests per second tolerated before the rate window asks to throttle.
    pub max_request_rate: f64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub use_proxy: bool,
    pub proxy_list: Vec<String>,
    /// Records requested per page.
    pub page_size: u32,
    /// Safety ceiling on pages fetched in one run.
    pub max_pages: u32,
    /// Rotate the session identity after this many pages.
    pub rotate_after_pages: u32,
    /// Rotate the session identity once it is this old.
    pub rotate_after_secs: u64,
    /// Cap on rotations triggered by the language-consistency check.
    pub max_degraded_rotations: u32,
    /// Stop paging once a page is mostly outside the date window.
    /// Off by default: page order is not guaranteed to be chronological.
    pub stop_when_past_window: bool,
    /// Fraction of out-of-window records on one page that counts as
    /// "past the window".
    pub past_window_fraction: f64,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            max_results: None,
            date_range: DateRange::All,
            sort_by_newest: false,
            language: "en".to_owned(),
            region: "us".to_owned(),
            fast_mode: false,
            max_request_rate: 1.0,
            request_timeout_secs: 30,
            max_retries: 3,
            use_proxy: false,
            proxy_list: Vec::new(),
            page_size: 20,
            max_pages: 500,
            rotate_after_pages: 50,
            rotate_after_secs: 1800,
            max_degraded_rotations: 3,
            stop_when_past_window: false,
            past_window_fraction: 0.7,
        }
    }
}

impl ScrapeOptions {
    /// Checks values that would make a run meaningless or loop forever.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.language.trim().is_empty() {
            return Err(ConfigError::Validation("language must be non-empty".into()));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::Validation("region must be non-empty".into()));
        }
        if !(self.max_request_rate.is_finite() && self.max_request_rate > 0.0) {
            return Err(ConfigError::Validation(format!(
                "max_request_rate must be a positive number, got {}",
                self.max_request_rate
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Validation("page_size must be at least 1".into()));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Validation("max_pages must be at least 1".into()));
        }
        if self.rotate_after_pages == 0 {
            return Err(ConfigError::Validation(
                "rotate_after_pages must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.past_window_fraction) {
            return Err(ConfigError::Validation(format!(
                "past_window_fraction must be within 0..=1, got {}",
                self.past_window_fraction
            )));
        }
        if self.use_proxy && self.proxy_list.is_empty() {
            return Err(ConfigError::Validation(
                "use_proxy is set but proxy_list is empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_presets() {
        assert_eq!("1month".parse::<DateRange>().unwrap(), DateRange::OneMonth);
        assert_eq!("7Years".parse::<DateRange>().unwrap(), DateRange::SevenYears);
        assert_eq!("all".parse::<DateRange>().unwrap(), DateRange::All);
    }

    #[test]
    fn parses_custom_range() {
        let range: DateRange = "2024-01-01..2024-06-30".parse().unwrap();
        assert_eq!(
            range,
            DateRange::Custom {
                start: date(2024, 1, 1),
                end: date(2024, 6, 30)
            }
        );
    }

    #[test]
    fn rejects_inverted_custom_range() {
        let result = "2024-06-30..2024-01-01".parse::<DateRange>();
        assert!(matches!(result, Err(ConfigError::InvalidDateRange(_))));
    }

    #[test]
    fn rejects_unknown_token() {
        assert!("fortnight".parse::<DateRange>().is_err());
    }

    #[test]
    fn display_round_trips_custom() {
        let range: DateRange = "2024-01-01..2024-06-30".parse().unwrap();
        assert_eq!(range.to_string(), "2024-01-01..2024-06-30");
    }

    #[test]
    fn one_year_window_is_inclusive_of_cutoff() {
        let today = date(2024, 6, 15);
        assert!(DateRange::OneYear.contains(date(2023, 6, 15), today));
        assert!(!DateRange::OneYear.contains(date(2023, 6, 14), today));
    }

    #[test]
    fn one_month_cutoff_clamps_to_month_end() {
        let today = date(2024, 3, 31);
        let (start, end) = DateRange::OneMonth.bounds(today);
        assert_eq!(start, Some(date(2024, 2, 29)));
        assert_eq!(end, None);
    }

    #[test]
    fn custom_range_is_inclusive_on_both_ends() {
        let range = DateRange::Custom {
            start: date(2024, 1, 1),
            end: date(2024, 1, 31),
        };
        let today = date(2030, 1, 1);
        assert!(range.contains(date(2024, 1, 1), today));
        assert!(range.contains(date(2024, 1, 31), today));
        assert!(!range.contains(date(2024, 2, 1), today));
    }

    #[test]
    fn all_contains_everything() {
        assert!(DateRange::All.contains(date(2001, 1, 1), date(2024, 1, 1)));
    }

    #[test]
    fn default_options_validate() {
        assert!(ScrapeOptions::default().validate().is_ok());
    }

    #[test]
    fn proxy_flag_without_list_is_rejected() {
        let options = ScrapeOptions {
            use_proxy: true,
            ..ScrapeOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn zero_rate_is_rejected() {
        let options = ScrapeOptions {
            max_request_rate: 0.0,
            ..ScrapeOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let options = ScrapeOptions {
            request_timeout_secs: 0,
            ..ScrapeOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"), "{err}");
    }

    #[test]
    fn deserializes_partial_options_from_yaml() {
        let options: ScrapeOptions =
            serde_yaml::from_str("max_results: 40\ndate_range: 6months\nsort_by_newest: true\n")
                .unwrap();
        assert_eq!(options.max_results, Some(40));
        assert_eq!(options.date_range, DateRange::SixMonths);
        assert!(options.sort_by_newest);
        assert_eq!(options.language, "en");
    }
}

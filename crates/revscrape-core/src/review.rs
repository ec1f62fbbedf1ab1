//! The decoded review record handed to output and translation collaborators.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel stored in [`Review::date_formatted`] (and sometimes
/// [`Review::date_relative`]) when no absolute date could be decoded.
pub const UNKNOWN_DATE: &str = "Unknown Date";

/// Format used for [`Review::date_formatted`].
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// One user-authored review.
///
/// `id` is the business key: two values with the same `id` describe the same
/// real-world review. `page_number` is provenance only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub author_name: String,
    pub author_profile_url: String,
    pub author_review_count: i64,
    /// 1 through 5, or 0 when the rating could not be decoded.
    pub rating: u8,
    pub text: String,
    /// Language tag as reported upstream; empty until a detection
    /// collaborator fills it in.
    pub language: String,
    /// `DD/MM/YYYY`, or [`UNKNOWN_DATE`].
    pub date_formatted: String,
    pub date_relative: String,
    pub like_count: i64,
    pub photo_count: i64,
    pub owner_response_text: String,
    pub page_number: u32,
}

impl Review {
    /// Returns the parsed absolute date, or `None` for the sentinel or any
    /// other value that is not a valid `DD/MM/YYYY` date.
    #[must_use]
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_formatted_date(&self.date_formatted)
    }
}

/// Parses a `DD/MM/YYYY` string as produced by the decoder.
#[must_use]
pub fn parse_formatted_date(value: &str) -> Option<NaiveDate> {
    if value == UNKNOWN_DATE {
        return None;
    }
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_month_year() {
        assert_eq!(
            parse_formatted_date("03/02/2024"),
            NaiveDate::from_ymd_opt(2024, 2, 3)
        );
    }

    #[test]
    fn sentinel_is_not_a_date() {
        assert!(parse_formatted_date(UNKNOWN_DATE).is_none());
    }

    #[test]
    fn rejects_impossible_day() {
        assert!(parse_formatted_date("31/02/2024").is_none());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let review = Review {
            id: "r1".to_owned(),
            author_name: "Ana".to_owned(),
            author_profile_url: String::new(),
            author_review_count: 3,
            rating: 5,
            text: "Great".to_owned(),
            language: String::new(),
            date_formatted: "01/01/2024".to_owned(),
            date_relative: "a year ago".to_owned(),
            like_count: 0,
            photo_count: 1,
            owner_response_text: String::new(),
            page_number: 1,
        };
        let json = serde_json::to_value(&review).unwrap();
        assert_eq!(json["authorReviewCount"], 3);
        assert_eq!(json["dateFormatted"], "01/01/2024");
        assert_eq!(json["ownerResponseText"], "");
        assert_eq!(json["pageNumber"], 1);
    }
}

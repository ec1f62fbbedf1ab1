//! Raw record → [`Review`] decoding.
//!
//! Each field is looked up through its candidate paths in
//! [`crate::paths::fields`]. Missing optional fields fall back to zero or an
//! empty string; only a missing id rejects the record.

use serde_json::Value;

use revscrape_core::Review;

use crate::dates::extract_date;
use crate::error::DecodeFailure;
use crate::paths::{as_int, as_len, as_text, fields, first_match, PathSpec};

/// Decodes one raw record fetched on `page_number`.
///
/// # Errors
///
/// Returns [`DecodeFailure::NotAnArray`] if `raw` is not an array and
/// [`DecodeFailure::MissingId`] if no candidate path yields a non-empty id.
pub fn decode(raw: &Value, page_number: u32) -> Result<Review, DecodeFailure> {
    if !raw.is_array() {
        return Err(DecodeFailure::NotAnArray { page: page_number });
    }

    let id = first_match(raw, fields::ID, as_text)
        .map(|id| id.trim().to_owned())
        .ok_or(DecodeFailure::MissingId { page: page_number })?;

    let rating = first_match(raw, fields::RATING, as_int)
        .filter(|r| (1..=5).contains(r))
        .and_then(|r| u8::try_from(r).ok())
        .unwrap_or(0);

    let date = extract_date(raw);

    Ok(Review {
        id,
        author_name: text_field(raw, fields::AUTHOR_NAME),
        author_profile_url: text_field(raw, fields::AUTHOR_PROFILE_URL),
        author_review_count: int_field(raw, fields::AUTHOR_REVIEW_COUNT),
        rating,
        text: text_field(raw, fields::TEXT),
        language: text_field(raw, fields::LANGUAGE),
        date_formatted: date.formatted,
        date_relative: date.relative,
        like_count: int_field(raw, fields::LIKE_COUNT),
        photo_count: first_match(raw, fields::PHOTOS, as_len).unwrap_or(0),
        owner_response_text: text_field(raw, fields::OWNER_RESPONSE),
        page_number,
    })
}

fn text_field(raw: &Value, specs: &[PathSpec]) -> String {
    first_match(raw, specs, as_text).unwrap_or_default()
}

fn int_field(raw: &Value, specs: &[PathSpec]) -> i64 {
    first_match(raw, specs, as_int).map_or(0, |n| n.max(0))
}

/// Outcome of decoding every record on one page.
#[derive(Debug, Default)]
pub struct DecodedPage {
    pub reviews: Vec<Review>,
    pub dropped: Vec<DecodeFailure>,
}

/// Decodes all records of a page. Failures are logged and collected; they
/// never stop the rest of the page.
#[must_use]
pub fn decode_page(records: &[Value], page_number: u32) -> DecodedPage {
    let mut page = DecodedPage::default();
    for (index, raw) in records.iter().enumerate() {
        match decode(raw, page_number) {
            Ok(review) => page.reviews.push(review),
            Err(e) => {
                tracing::warn!(page = page_number, index, error = %e, "dropping undecodable record");
                page.dropped.push(e);
            }
        }
    }
    page
}

#[cfg(test)]
#[path = "decode_test.rs"]
mod tests;

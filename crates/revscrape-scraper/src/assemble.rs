//! Accumulates decoded reviews across pages.
//!
//! Dedup is by `id` with the first-seen copy kept. The date window is applied
//! as reviews arrive; a review whose date cannot be parsed is always kept.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::NaiveDate;

use revscrape_core::{DateRange, Review};

/// Default share of out-of-window records that marks a page as past the window.
pub const DEFAULT_PAST_WINDOW_FRACTION: f64 = 0.7;

/// What happened to one batch handed to [`ResultAssembler::accept`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptOutcome {
    pub added: usize,
    pub duplicates: usize,
    pub out_of_range: usize,
    /// Kept reviews whose date could not be parsed.
    pub undated: usize,
    /// More than the configured fraction of the batch fell outside the window.
    pub past_window: bool,
}

#[derive(Debug)]
pub struct ResultAssembler {
    date_range: DateRange,
    today: NaiveDate,
    past_window_fraction: f64,
    reviews: Vec<Review>,
    seen: HashSet<String>,
}

impl ResultAssembler {
    /// `today` anchors preset ranges such as `1year`.
    #[must_use]
    pub fn new(date_range: DateRange, today: NaiveDate) -> Self {
        Self {
            date_range,
            today,
            past_window_fraction: DEFAULT_PAST_WINDOW_FRACTION,
            reviews: Vec::new(),
            seen: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_past_window_fraction(mut self, fraction: f64) -> Self {
        self.past_window_fraction = fraction;
        self
    }

    /// Adds one page worth of reviews.
    pub fn accept(&mut self, reviews: Vec<Review>) -> AcceptOutcome {
        let mut outcome = AcceptOutcome::default();
        let batch = reviews.len();

        for review in reviews {
            if !self.seen.insert(review.id.clone()) {
                outcome.duplicates += 1;
                continue;
            }
            match review.parsed_date() {
                Some(date) if !self.date_range.contains(date, self.today) => {
                    outcome.out_of_range += 1;
                }
                parsed => {
                    if parsed.is_none() {
                        outcome.undated += 1;
                    }
                    outcome.added += 1;
                    self.reviews.push(review);
                }
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let out_share = outcome.out_of_range as f64 / batch.max(1) as f64;
        outcome.past_window = batch > 0 && out_share > self.past_window_fraction;
        if outcome.past_window {
            tracing::info!(
                out_of_range = outcome.out_of_range,
                batch,
                range = %self.date_range,
                "page is mostly outside the requested date window"
            );
        }
        outcome
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    #[must_use]
    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    /// Consumes the assembler. With `sort_by_newest`, reviews are stably
    /// sorted by date descending with undated reviews last; otherwise the
    /// arrival order is kept. The result is then truncated to `max_results`.
    #[must_use]
    pub fn into_reviews(self, sort_by_newest: bool, max_results: Option<usize>) -> Vec<Review> {
        let mut reviews = self.reviews;
        if sort_by_newest {
            reviews.sort_by(|a, b| newest_first(a.parsed_date(), b.parsed_date()));
        }
        if let Some(max) = max_results {
            reviews.truncate(max);
        }
        reviews
    }
}

fn newest_first(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

//! The paging loop that drives one scrape run.

use std::collections::HashSet;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use revscrape_core::{Review, ScrapeOptions};

use crate::assemble::ResultAssembler;
use crate::decode::decode_page;
use crate::language::check_page;
use crate::report::{RunPhase, RunStatus, ScrapeReport, ScrapeStats, Truncation};
use crate::session::{RotationPolicy, RotationReason, SessionRotator};

use super::{PageFetcher, ReviewScraper};

/// A decoded page that has not been handed to the assembler yet.
struct HeldPage {
    reviews: Vec<Review>,
    records: usize,
    next_cursor: Option<String>,
    attempts: u32,
}

/// A page being requested a second time under a new session, and what to
/// fall back on if that request fails.
enum Reissue {
    /// Already accepted; only its cursor is still needed.
    Scheduled { next: String },
    /// Held back because its results mixed languages.
    Degraded(HeldPage),
}

/// Everything one run accumulates. Created per call to
/// [`ReviewScraper::scrape`] and consumed into its [`ScrapeReport`].
#[derive(Debug)]
pub struct ScrapeRunState {
    phase: RunPhase,
    place_id: String,
    assembler: ResultAssembler,
    cursor: Option<String>,
    page_number: u32,
    seen_cursors: HashSet<String>,
    stats: ScrapeStats,
    warnings: Vec<String>,
    truncation: Option<Truncation>,
}

impl ScrapeRunState {
    #[must_use]
    pub fn new(place_id: &str, assembler: ResultAssembler) -> Self {
        Self {
            phase: RunPhase::Idle,
            place_id: place_id.to_owned(),
            assembler,
            cursor: None,
            page_number: 1,
            seen_cursors: HashSet::new(),
            stats: ScrapeStats::default(),
            warnings: Vec::new(),
            truncation: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    #[must_use]
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    #[must_use]
    pub fn stats(&self) -> &ScrapeStats {
        &self.stats
    }

    fn transition(&mut self, next: RunPhase) {
        if self.phase != next {
            tracing::debug!(
                place_id = %self.place_id,
                from = %self.phase,
                to = %next,
                page = self.page_number,
                "run phase changed"
            );
            self.phase = next;
        }
    }

    fn warn(&mut self, message: String) {
        tracing::warn!(place_id = %self.place_id, "{message}");
        self.warnings.push(message);
    }

    fn advance(&mut self, next: String) {
        self.seen_cursors.insert(next.clone());
        self.cursor = Some(next);
        self.page_number += 1;
    }

    fn stop(&mut self, truncation: Truncation) {
        tracing::info!(place_id = %self.place_id, %truncation, "stopping early");
        self.truncation = Some(truncation);
    }

    fn fail(mut self, reason: String) -> ScrapeReport {
        self.transition(RunPhase::Failed);
        tracing::error!(place_id = %self.place_id, %reason, "scrape failed");
        ScrapeReport {
            place_id: self.place_id,
            status: RunStatus::Failed { reason },
            truncation: None,
            reviews: Vec::new(),
            stats: self.stats,
            warnings: self.warnings,
        }
    }

    fn complete(mut self, options: &ScrapeOptions) -> ScrapeReport {
        self.transition(RunPhase::Completed);
        let reviews = self
            .assembler
            .into_reviews(options.sort_by_newest, options.max_results);
        tracing::info!(
            place_id = %self.place_id,
            reviews = reviews.len(),
            pages = self.stats.pages_fetched,
            requests = self.stats.requests_sent,
            retries = self.stats.retries_used,
            rate_limits = self.stats.rate_limits_encountered,
            rotations = self.stats.session_rotations,
            truncated = self.truncation.is_some(),
            "scrape completed"
        );
        ScrapeReport {
            place_id: self.place_id,
            status: RunStatus::Completed,
            truncation: self.truncation,
            reviews,
            stats: self.stats,
            warnings: self.warnings,
        }
    }
}

impl ReviewScraper {
    /// Scrapes every page of reviews for `place_id`.
    ///
    /// Never returns an error: failures are reported through
    /// [`ScrapeReport::status`] and [`ScrapeReport::truncation`]. A failure on
    /// the first page yields [`RunStatus::Failed`]; a failure on any later
    /// page keeps what was collected and records
    /// [`Truncation::PageFailed`]. Cancellation is checked between pages.
    pub async fn scrape(
        &self,
        place_id: &str,
        options: &ScrapeOptions,
        cancel: &CancellationToken,
    ) -> ScrapeReport {
        let assembler = ResultAssembler::new(options.date_range, self.today())
            .with_past_window_fraction(options.past_window_fraction);
        let mut state = ScrapeRunState::new(place_id, assembler);
        state.transition(RunPhase::Initializing);

        if place_id.trim().is_empty() {
            return state.fail("place id is empty".to_owned());
        }
        if let Err(e) = options.validate() {
            return state.fail(e.to_string());
        }

        let proxies = if options.use_proxy {
            options.proxy_list.clone()
        } else {
            Vec::new()
        };
        let policy = RotationPolicy {
            max_pages: options.rotate_after_pages,
            max_age: Duration::from_secs(options.rotate_after_secs),
        };
        let mut sessions = SessionRotator::new(&options.language, &options.region, proxies, policy);
        let mut fetcher = PageFetcher::new(self, options, place_id);

        tracing::info!(
            place_id,
            language = %options.language,
            region = %options.region,
            range = %options.date_range,
            max_results = ?options.max_results,
            "starting scrape"
        );
        state.transition(RunPhase::Paging);

        let mut degraded_rotations = 0u32;
        let mut scheduled_reissue = false;
        let mut reissue: Option<Reissue> = None;

        loop {
            if cancel.is_cancelled() {
                let after_page = state.page_number - 1;
                state.stop(Truncation::Cancelled { after_page });
                break;
            }
            if state.page_number > options.max_pages {
                state.stop(Truncation::PageCeiling {
                    max_pages: options.max_pages,
                });
                break;
            }

            let page_number = state.page_number;
            let cursor = state.cursor.clone();
            let mut stats = state.stats;
            let result = fetcher
                .fetch_notifying(
                    cursor.as_deref(),
                    page_number,
                    &mut sessions,
                    &mut stats,
                    |_, _| state.transition(RunPhase::Retrying),
                )
                .await;
            state.stats = stats;

            let page = match result {
                Ok(fetched) => {
                    state.stats.pages_fetched += 1;
                    sessions.note_page();

                    let decoded = decode_page(&fetched.records, page_number);
                    if !decoded.dropped.is_empty() {
                        let dropped = u32::try_from(decoded.dropped.len()).unwrap_or(u32::MAX);
                        state.stats.records_dropped += dropped;
                        state.warn(format!(
                            "page {page_number}: dropped {dropped} undecodable record(s)"
                        ));
                    }
                    let page = HeldPage {
                        reviews: decoded.reviews,
                        records: fetched.records.len(),
                        next_cursor: fetched.next_cursor,
                        attempts: fetched.attempts,
                    };

                    let check = check_page(&page.reviews);
                    if check.mixed {
                        let retried = matches!(reissue, Some(Reissue::Degraded(_)));
                        if !retried && degraded_rotations < options.max_degraded_rotations {
                            degraded_rotations += 1;
                            state.stats.degraded_rotations = degraded_rotations;
                            tracing::warn!(
                                place_id,
                                page = page_number,
                                samples = check.samples,
                                dominant_share = check.dominant_share,
                                "page mixes languages, rotating session and retrying it"
                            );
                            sessions.rotate(RotationReason::SessionDegraded);
                            state.transition(RunPhase::Retrying);
                            reissue = Some(Reissue::Degraded(page));
                            continue;
                        }
                        state.warn(format!(
                            "page {page_number}: mixed-language results accepted without retry"
                        ));
                    }
                    reissue = None;
                    page
                }
                Err(e) => match reissue.take() {
                    Some(Reissue::Degraded(page)) => {
                        state.warn(format!(
                            "page {page_number}: retry after mixed-language results failed, \
                             keeping the first response: {e}"
                        ));
                        page
                    }
                    Some(Reissue::Scheduled { next }) => {
                        state.warn(format!(
                            "page {page_number}: re-request under a new session failed, \
                             continuing with the known cursor: {e}"
                        ));
                        scheduled_reissue = false;
                        state.transition(RunPhase::Paging);
                        state.advance(next);
                        continue;
                    }
                    None => {
                        state.stats.session_rotations = sessions.rotations();
                        if page_number == 1 && state.assembler.is_empty() {
                            return state.fail(e.to_string());
                        }
                        state.warn(format!(
                            "page {page_number} failed, keeping {} review(s) collected so far: {e}",
                            state.assembler.len()
                        ));
                        state.stop(Truncation::PageFailed {
                            page: page_number,
                            reason: e.to_string(),
                        });
                        break;
                    }
                },
            };

            let outcome = state.assembler.accept(page.reviews);
            state.stats.duplicates += u32::try_from(outcome.duplicates).unwrap_or(u32::MAX);
            state.stats.out_of_range += u32::try_from(outcome.out_of_range).unwrap_or(u32::MAX);
            state.transition(RunPhase::Paging);
            tracing::debug!(
                place_id,
                page = page_number,
                records = page.records,
                added = outcome.added,
                duplicates = outcome.duplicates,
                out_of_range = outcome.out_of_range,
                total = state.assembler.len(),
                attempts = page.attempts,
                "page accepted"
            );

            if options
                .max_results
                .is_some_and(|max| state.assembler.len() >= max)
            {
                break;
            }
            if outcome.past_window && options.stop_when_past_window {
                state.stop(Truncation::PastDateWindow { page: page_number });
                break;
            }
            let Some(next) = page.next_cursor else {
                break;
            };
            if state.seen_cursors.contains(&next) || state.cursor.as_deref() == Some(next.as_str()) {
                state.stop(Truncation::CursorCycle { page: page_number });
                break;
            }

            if !scheduled_reissue && sessions.rotation_due() {
                scheduled_reissue = true;
                sessions.rotate(RotationReason::Scheduled);
                state.transition(RunPhase::Retrying);
                reissue = Some(Reissue::Scheduled { next });
                continue;
            }
            scheduled_reissue = false;
            state.advance(next);
        }

        state.stats.session_rotations = sessions.rotations();
        state.complete(options)
    }
}

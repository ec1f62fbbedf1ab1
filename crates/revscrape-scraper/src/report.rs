//! Run counters and the final report handed back to callers.

use serde::Serialize;

use revscrape_core::Review;

/// Counters collected over one run. Always returned, whatever the outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeStats {
    pub requests_sent: u32,
    pub requests_succeeded: u32,
    pub requests_failed: u32,
    pub retries_used: u32,
    pub rate_limits_encountered: u32,
    pub session_rotations: u32,
    pub degraded_rotations: u32,
    pub pages_fetched: u32,
    pub records_dropped: u32,
    pub duplicates: u32,
    pub out_of_range: u32,
}

/// Orchestrator phase. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Initializing,
    Paging,
    Retrying,
    Completed,
    Failed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Initializing => "initializing",
            RunPhase::Paging => "paging",
            RunPhase::Retrying => "retrying",
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed { reason: String },
}

/// Why a completed run returned less than the endpoint could have given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Truncation {
    /// A page after the first failed terminally.
    PageFailed { page: u32, reason: String },
    Cancelled { after_page: u32 },
    /// The configured page ceiling was reached with a cursor still pending.
    PageCeiling { max_pages: u32 },
    /// The endpoint handed back a cursor it had already given.
    CursorCycle { page: u32 },
    /// Opt-in early stop: the last page was mostly outside the date window.
    PastDateWindow { page: u32 },
}

impl std::fmt::Display for Truncation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Truncation::PageFailed { page, reason } => {
                write!(f, "page {page} failed: {reason}")
            }
            Truncation::Cancelled { after_page } => write!(f, "cancelled after page {after_page}"),
            Truncation::PageCeiling { max_pages } => {
                write!(f, "stopped at the {max_pages}-page ceiling")
            }
            Truncation::CursorCycle { page } => write!(f, "cursor repeated at page {page}"),
            Truncation::PastDateWindow { page } => {
                write!(f, "page {page} was past the requested date window")
            }
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeReport {
    pub place_id: String,
    pub status: RunStatus,
    pub truncation: Option<Truncation>,
    pub reviews: Vec<Review>,
    pub stats: ScrapeStats,
    pub warnings: Vec<String>,
}

impl ScrapeReport {
    /// `true` when the run completed but stopped early for a reason other
    /// than reaching `max_results` or the end of the feed.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status, RunStatus::Failed { .. })
    }

    /// The failure reason for a failed run.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Failed { reason } => Some(reason),
            RunStatus::Completed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: RunStatus, truncation: Option<Truncation>) -> ScrapeReport {
        ScrapeReport {
            place_id: "p".to_owned(),
            status,
            truncation,
            reviews: Vec::new(),
            stats: ScrapeStats::default(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn truncation_flag_follows_reason() {
        assert!(!report(RunStatus::Completed, None).is_truncated());
        let r = report(
            RunStatus::Completed,
            Some(Truncation::PageFailed {
                page: 5,
                reason: "HTTP 404".to_owned(),
            }),
        );
        assert!(r.is_truncated());
        assert!(!r.is_failed());
    }

    #[test]
    fn failed_report_exposes_reason() {
        let r = report(
            RunStatus::Failed {
                reason: "boom".to_owned(),
            },
            None,
        );
        assert!(r.is_failed());
        assert_eq!(r.failure_reason(), Some("boom"));
    }

    #[test]
    fn serializes_with_camel_case_and_tags() {
        let mut r = report(RunStatus::Completed, Some(Truncation::Cancelled { after_page: 3 }));
        r.stats.rate_limits_encountered = 2;
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"]["status"], "completed");
        assert_eq!(json["truncation"]["kind"], "cancelled");
        assert_eq!(json["truncation"]["after_page"], 3);
        assert_eq!(json["stats"]["rateLimitsEncountered"], 2);
        assert_eq!(json["placeId"], "p");
    }

    #[test]
    fn truncation_display_is_readable() {
        assert_eq!(
            Truncation::PageCeiling { max_pages: 500 }.to_string(),
            "stopped at the 500-page ceiling"
        );
    }
}

//! Runs one scrape per place, bounded by `max_concurrent_runs`, and hands
//! each result to the output sink.

use std::path::Path;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use revscrape_core::{AppConfig, PlaceConfig, ScrapeOptions};
use revscrape_scraper::{FetchConfig, OutputSink, ReviewScraper, RunMetadata, ScrapeReport};

use crate::output::JsonFileSink;

/// One place to scrape with its fully resolved options.
#[derive(Debug, Clone)]
pub(crate) struct PlaceJob {
    pub slug: String,
    pub name: Option<String>,
    pub place_id: String,
    pub options: ScrapeOptions,
}

impl PlaceJob {
    /// A job for an ad-hoc `scrape` invocation. The slug comes from the name
    /// when given, otherwise from the place id.
    pub(crate) fn single(place_id: String, name: Option<String>, options: ScrapeOptions) -> Self {
        let place = PlaceConfig {
            name: name.clone().unwrap_or_else(|| place_id.clone()),
            place_id: place_id.clone(),
            max_results: None,
            date_range: None,
            sort_by_newest: None,
            language: None,
            region: None,
        };
        Self {
            slug: place.slug(),
            name,
            place_id,
            options,
        }
    }

    fn from_place(place: &PlaceConfig, base: &ScrapeOptions) -> Self {
        Self {
            slug: place.slug(),
            name: Some(place.name.clone()),
            place_id: place.place_id.clone(),
            options: place.apply(base),
        }
    }
}

/// Loads the places file and resolves each entry against `base`.
///
/// If `only` is `Some(slug)`, returns just that place or an error if the
/// slug is unknown.
pub(crate) fn load_jobs(
    places_path: &Path,
    only: Option<&str>,
    base: &ScrapeOptions,
) -> anyhow::Result<Vec<PlaceJob>> {
    let places = revscrape_core::load_places(places_path)?;
    let jobs: Vec<PlaceJob> = places
        .places
        .iter()
        .map(|p| PlaceJob::from_place(p, base))
        .collect();

    match only {
        Some(slug) => {
            let job = jobs
                .into_iter()
                .find(|j| j.slug == slug)
                .ok_or_else(|| anyhow::anyhow!("place '{slug}' not found in places file"))?;
            Ok(vec![job])
        }
        None => {
            if jobs.is_empty() {
                anyhow::bail!("places file {} lists no places", places_path.display());
            }
            Ok(jobs)
        }
    }
}

/// Outcome of one place's run as seen by the batch.
#[derive(Debug)]
pub(crate) enum PlaceOutcome {
    Written {
        reviews: usize,
        truncated: bool,
    },
    Failed(String),
}

/// Aggregated totals for a batch.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct BatchTotals {
    pub places: usize,
    pub reviews: usize,
    pub truncated: usize,
    pub failed: usize,
}

/// Builds the HTTP scraper and file sink from `config`, runs `jobs`, and
/// prints a summary line.
///
/// # Errors
///
/// Returns an error if the scraper cannot be built or every place failed.
pub(crate) async fn run_jobs(
    config: &AppConfig,
    output_dir: &Path,
    jobs: Vec<PlaceJob>,
    cancel: &CancellationToken,
) -> anyhow::Result<BatchTotals> {
    let scraper = ReviewScraper::new(FetchConfig::from_app_config(config))?;
    let sink = JsonFileSink::new(output_dir);
    let totals = run_with(
        &scraper,
        &sink,
        jobs,
        config.max_concurrent_runs.max(1),
        cancel,
    )
    .await?;

    println!(
        "scraped {} places: {} reviews, {} truncated, {} failed",
        totals.places, totals.reviews, totals.truncated, totals.failed
    );
    Ok(totals)
}

/// Runs every job with at most `max_concurrent` scrapes in flight.
pub(crate) async fn run_with(
    scraper: &ReviewScraper,
    sink: &dyn OutputSink,
    jobs: Vec<PlaceJob>,
    max_concurrent: usize,
    cancel: &CancellationToken,
) -> anyhow::Result<BatchTotals> {
    let place_count = jobs.len();

    let results: Vec<(PlaceJob, PlaceOutcome)> = stream::iter(jobs)
        .map(|job| async move {
            let outcome = run_place(scraper, sink, &job, cancel).await;
            (job, outcome)
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let mut totals = BatchTotals {
        places: place_count,
        ..BatchTotals::default()
    };
    for (job, outcome) in &results {
        match outcome {
            PlaceOutcome::Written { reviews, truncated } => {
                totals.reviews = totals.reviews.saturating_add(*reviews);
                if *truncated {
                    totals.truncated += 1;
                }
            }
            PlaceOutcome::Failed(reason) => {
                tracing::error!(place = %job.slug, error = %reason, "place failed");
                totals.failed += 1;
            }
        }
    }

    if totals.failed > 0 {
        tracing::warn!(
            failed_places = totals.failed,
            total_places = place_count,
            "some places failed during the batch"
        );
    }

    if place_count > 0 && totals.failed == place_count {
        anyhow::bail!("all {place_count} places failed");
    }

    Ok(totals)
}

async fn run_place(
    scraper: &ReviewScraper,
    sink: &dyn OutputSink,
    job: &PlaceJob,
    cancel: &CancellationToken,
) -> PlaceOutcome {
    tracing::info!(place = %job.slug, place_id = %job.place_id, "starting scrape");
    let report = scraper.scrape(&job.place_id, &job.options, cancel).await;
    log_report(job, &report);

    if let Some(reason) = report.failure_reason() {
        return PlaceOutcome::Failed(reason.to_owned());
    }

    let metadata = RunMetadata::from_report(
        &report,
        &job.options,
        job.name.as_deref(),
        chrono::Utc::now(),
    );
    match sink.write(&report.reviews, &metadata).await {
        Ok(()) => PlaceOutcome::Written {
            reviews: report.reviews.len(),
            truncated: report.is_truncated(),
        },
        Err(e) => PlaceOutcome::Failed(format!("output failed: {e}")),
    }
}

fn log_report(job: &PlaceJob, report: &ScrapeReport) {
    for warning in &report.warnings {
        tracing::warn!(place = %job.slug, "{warning}");
    }
    match &report.truncation {
        Some(truncation) => tracing::warn!(
            place = %job.slug,
            reviews = report.reviews.len(),
            pages = report.stats.pages_fetched,
            %truncation,
            "scrape truncated"
        ),
        None => tracing::info!(
            place = %job.slug,
            reviews = report.reviews.len(),
            pages = report.stats.pages_fetched,
            rotations = report.stats.session_rotations,
            "scrape finished"
        ),
    }
}

#[cfg(test)]
#[path = "scrape_test.rs"]
mod tests;

//! JSON file sink: one document per place per run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use revscrape_core::{PlaceConfig, Review};
use revscrape_scraper::{CollaboratorError, OutputSink, RunMetadata};

#[derive(Serialize)]
struct OutputDocument<'a> {
    metadata: &'a RunMetadata,
    reviews: &'a [Review],
}

/// Writes `{dir}/{slug}-{timestamp}.json` containing the run metadata and
/// every review.
#[derive(Debug, Clone)]
pub(crate) struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub(crate) fn path_for(&self, metadata: &RunMetadata) -> PathBuf {
        let stem = file_stem(metadata);
        let stamp = metadata.scraped_at.format("%Y%m%dT%H%M%SZ");
        self.dir.join(format!("{stem}-{stamp}.json"))
    }
}

/// Slug of the place name, falling back to the place id.
fn file_stem(metadata: &RunMetadata) -> String {
    let name = metadata
        .place_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| metadata.place_id.clone());
    let slug = PlaceConfig {
        name,
        place_id: metadata.place_id.clone(),
        max_results: None,
        date_range: None,
        sort_by_newest: None,
        language: None,
        region: None,
    }
    .slug();
    if slug.is_empty() {
        "place".to_owned()
    } else {
        slug
    }
}

async fn ensure_dir(dir: &Path) -> Result<(), CollaboratorError> {
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

#[async_trait]
impl OutputSink for JsonFileSink {
    async fn write(
        &self,
        reviews: &[Review],
        metadata: &RunMetadata,
    ) -> Result<(), CollaboratorError> {
        ensure_dir(&self.dir).await?;
        let path = self.path_for(metadata);
        let body = serde_json::to_vec_pretty(&OutputDocument { metadata, reviews })?;
        tokio::fs::write(&path, body).await.map_err(|e| {
            CollaboratorError::Output(format!("failed to write {}: {e}", path.display()))
        })?;
        tracing::info!(
            path = %path.display(),
            reviews = reviews.len(),
            "wrote reviews"
        );
        Ok(())
    }
}

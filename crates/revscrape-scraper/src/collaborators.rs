//! Interfaces the engine hands its results to.
//!
//! Implementations live outside this crate (the CLI ships a JSON file sink).
//! Collaborator failures never change a run's outcome; the helpers here log
//! and skip the affected review.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use revscrape_core::{Review, ScrapeOptions};

use crate::report::{RunStatus, ScrapeReport, ScrapeStats, Truncation};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("translation service error: {0}")]
    Translation(String),

    #[error("output sink error: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Returns a language tag such as `"en"` for `text`.
    async fn detect(&self, text: &str) -> Result<String, CollaboratorError>;

    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, CollaboratorError>;
}

/// Describes the run a batch of reviews came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub place_id: String,
    pub place_name: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub status: RunStatus,
    pub truncation: Option<Truncation>,
    pub stats: ScrapeStats,
    pub review_count: usize,
    pub date_range: String,
    pub sort_by_newest: bool,
    pub language: String,
    pub region: String,
}

impl RunMetadata {
    #[must_use]
    pub fn from_report(
        report: &ScrapeReport,
        options: &ScrapeOptions,
        place_name: Option<&str>,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        Self {
            place_id: report.place_id.clone(),
            place_name: place_name.map(str::to_owned),
            scraped_at,
            status: report.status.clone(),
            truncation: report.truncation.clone(),
            stats: report.stats,
            review_count: report.reviews.len(),
            date_range: options.date_range.to_string(),
            sort_by_newest: options.sort_by_newest,
            language: options.language.clone(),
            region: options.region.clone(),
        }
    }
}

#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn write(&self, reviews: &[Review], metadata: &RunMetadata) -> Result<(), CollaboratorError>;
}

/// Fills [`Review::language`] for every review with text and no language.
/// Returns how many reviews were updated.
pub async fn detect_languages(reviews: &mut [Review], service: &dyn TranslationService) -> usize {
    let mut updated = 0;
    for review in reviews
        .iter_mut()
        .filter(|r| r.language.is_empty() && !r.text.trim().is_empty())
    {
        match service.detect(&review.text).await {
            Ok(tag) if !tag.trim().is_empty() => {
                review.language = tag.trim().to_lowercase();
                updated += 1;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(review_id = %review.id, error = %e, "language detection failed");
            }
        }
    }
    updated
}

/// Translates review text and owner responses into `target_lang` for
/// reviews whose detected language differs from it. Returns how many
/// reviews were translated.
pub async fn translate_reviews(
    reviews: &mut [Review],
    service: &dyn TranslationService,
    target_lang: &str,
) -> usize {
    let mut translated = 0;
    for review in reviews.iter_mut().filter(|r| {
        !r.language.is_empty() && !r.language.eq_ignore_ascii_case(target_lang)
    }) {
        let text = match translate_field(service, &review.text, target_lang).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(review_id = %review.id, error = %e, "translation failed");
                continue;
            }
        };
        let response = match translate_field(service, &review.owner_response_text, target_lang).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(review_id = %review.id, error = %e, "owner response translation failed");
                continue;
            }
        };
        review.text = text;
        review.owner_response_text = response;
        target_lang.clone_into(&mut review.language);
        translated += 1;
    }
    translated
}

async fn translate_field(
    service: &dyn TranslationService,
    text: &str,
    target_lang: &str,
) -> Result<String, CollaboratorError> {
    if text.trim().is_empty() {
        return Ok(text.to_owned());
    }
    service.translate(text, target_lang).await
}

#[cfg(test)]
mod tests {
    use revscrape_core::UNKNOWN_DATE;

    use super::*;

    struct FakeTranslator;

    #[async_trait]
    impl TranslationService for FakeTranslator {
        async fn detect(&self, text: &str) -> Result<String, CollaboratorError> {
            if text.contains("fail") {
                return Err(CollaboratorError::Translation("detector down".to_owned()));
            }
            Ok(if text.starts_with("Bon") { "FR" } else { "en" }.to_owned())
        }

        async fn translate(&self, text: &str, target_lang: &str) -> Result<String, CollaboratorError> {
            Ok(format!("[{target_lang}] {text}"))
        }
    }

    fn review(id: &str, text: &str, language: &str) -> Review {
        Review {
            id: id.to_owned(),
            author_name: String::new(),
            author_profile_url: String::new(),
            author_review_count: 0,
            rating: 3,
            text: text.to_owned(),
            language: language.to_owned(),
            date_formatted: UNKNOWN_DATE.to_owned(),
            date_relative: String::new(),
            like_count: 0,
            photo_count: 0,
            owner_response_text: String::new(),
            page_number: 1,
        }
    }

    #[tokio::test]
    async fn detect_fills_only_missing_languages() {
        let mut reviews = vec![
            review("a", "Bonjour", ""),
            review("b", "Hello", "de"),
            review("c", "", ""),
            review("d", "please fail", ""),
        ];
        let updated = detect_languages(&mut reviews, &FakeTranslator).await;
        assert_eq!(updated, 1);
        assert_eq!(reviews[0].language, "fr");
        assert_eq!(reviews[1].language, "de");
        assert_eq!(reviews[2].language, "");
        assert_eq!(reviews[3].language, "");
    }

    #[tokio::test]
    async fn translate_skips_reviews_already_in_target() {
        let mut reviews = vec![review("a", "Bonjour", "fr"), review("b", "Hello", "en")];
        reviews[0].owner_response_text = "Merci".to_owned();
        let translated = translate_reviews(&mut reviews, &FakeTranslator, "en").await;
        assert_eq!(translated, 1);
        assert_eq!(reviews[0].text, "[en] Bonjour");
        assert_eq!(reviews[0].owner_response_text, "[en] Merci");
        assert_eq!(reviews[0].language, "en");
        assert_eq!(reviews[1].text, "Hello");
    }
}

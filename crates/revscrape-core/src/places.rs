//! YAML list of places to scrape, with optional per-place option overrides.
//!
//! ```yaml
//! places:
//!   - name: Corner Bakery
//!     place_id: "0x89c259af:0x1f2c3b"
//!     max_results: 200
//!     date_range: 1year
//!     sort_by_newest: true
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::options::{DateRange, ScrapeOptions};
use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceConfig {
    pub name: String,
    pub place_id: String,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub sort_by_newest: Option<bool>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl PlaceConfig {
    /// Generate a filesystem-safe slug from the place name.
    #[must_use]
    pub fn slug(&self) -> String {
        self.name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Layers this place's overrides on top of `base`.
    #[must_use]
    pub fn apply(&self, base: &ScrapeOptions) -> ScrapeOptions {
        let mut options = base.clone();
        if self.max_results.is_some() {
            options.max_results = self.max_results;
        }
        if let Some(range) = self.date_range {
            options.date_range = range;
        }
        if let Some(sort) = self.sort_by_newest {
            options.sort_by_newest = sort;
        }
        if let Some(language) = &self.language {
            options.language.clone_from(language);
        }
        if let Some(region) = &self.region {
            options.region.clone_from(region);
        }
        options
    }
}

#[derive(Debug, Deserialize)]
pub struct PlacesFile {
    pub places: Vec<PlaceConfig>,
}

/// Load and validate the places list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_places(path: &Path) -> Result<PlacesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PlacesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let places_file: PlacesFile =
        serde_yaml::from_str(&content).map_err(ConfigError::PlacesFileParse)?;

    validate_places(&places_file)?;

    Ok(places_file)
}

fn validate_places(places_file: &PlacesFile) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();
    let mut seen_slugs = HashSet::new();

    for place in &places_file.places {
        if place.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "place name must be non-empty".to_string(),
            ));
        }

        if place.place_id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "place '{}' has an empty place_id",
                place.name
            )));
        }

        if !seen_ids.insert(place.place_id.trim().to_owned()) {
            return Err(ConfigError::Validation(format!(
                "duplicate place_id: '{}'",
                place.place_id
            )));
        }

        let slug = place.slug();
        if !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate place slug: '{}' (from place '{}')",
                slug, place.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "places_test.rs"]
mod tests;

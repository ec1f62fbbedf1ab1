pub mod app_config;
pub mod config;
pub mod options;
pub mod places;
pub mod review;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use options::{DateRange, ScrapeOptions};
pub use places::{load_places, PlaceConfig, PlacesFile};
pub use review::{parse_formatted_date, Review, UNKNOWN_DATE};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read places file {path}: {source}")]
    PlacesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse places file: {0}")]
    PlacesFileParse(#[from] serde_yaml::Error),

    #[error("invalid date range \"{0}\"")]
    InvalidDateRange(String),

    #[error("validation error: {0}")]
    Validation(String),
}

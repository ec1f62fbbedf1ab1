pub mod assemble;
pub mod client;
pub mod collaborators;
pub mod dates;
pub mod decode;
pub mod error;
pub mod language;
pub mod pagination;
pub mod paths;
pub mod rate_window;
pub mod report;
pub mod retry;
pub mod session;

pub use assemble::{AcceptOutcome, ResultAssembler};
pub use client::{FetchConfig, FetchedPage, PageFetcher, ReviewScraper, ScrapeRunState};
pub use collaborators::{
    detect_languages, translate_reviews, CollaboratorError, OutputSink, RunMetadata,
    TranslationService,
};
pub use decode::{decode, decode_page};
pub use error::{DecodeFailure, FetchFailure};
pub use rate_window::{RateWindow, Throttle};
pub use report::{RunPhase, RunStatus, ScrapeReport, ScrapeStats, Truncation};
pub use retry::{Sleeper, TokioSleeper};
pub use session::{RotationPolicy, RotationReason, SessionIdentity, SessionRotator};

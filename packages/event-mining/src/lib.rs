//! Web content mining pipeline for the Vívelo events platform.
//!
//! Takes a source URL, retrieves its rendered content (static fetch with a
//! headless-browser fallback), asks the extraction model for discrete event
//! listings, validates and deduplicates the candidates, and stores the
//! survivors unpublished for later moderation.

pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod process;
pub mod storage;
pub mod types;

pub use config::MiningConfig;
pub use error::{ExtractError, FetchError};
pub use extract::{EventExtractor, OpenAiExtractor};
pub use fetch::{ContentFetcher, FetchOptions, WebContentFetcher};
pub use pipeline::{MiningPipeline, NoopSink, ProgressSink};
pub use process::EventProcessor;
pub use storage::{EventStore, PostgresEventStore};
pub use types::{
    CategorySlug, CitySlug, ExtractionCandidate, FetchMethod, FetchedContent, MiningStatus,
    MiningSummary, ProgressUpdate,
};

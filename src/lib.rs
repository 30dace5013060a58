//! Quote-Harvest: a paginated quote crawler
//!
//! This crate drives a headless browser through a JavaScript-rendered,
//! paginated quote listing, extracts every quote block it finds, and writes
//! the whole harvest into SQLite in a single batch.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Quote-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Navigation error for {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Persistence error: {persisted} of {attempted} records written: {source}")]
    Persistence {
        attempted: usize,
        persisted: usize,
        source: storage::StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlState,
        to: state::CrawlState,
    },
}

impl HarvestError {
    /// Names the crawl stage that failed, for the final report
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Navigation { .. } => "navigation",
            Self::Browser(_) => "browser session",
            Self::Persistence { .. } | Self::Storage(_) => "persistence",
            Self::InvalidTransition { .. } => "pagination",
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Document-level extraction failures
///
/// Per-block problems are never errors; they surface as
/// [`crawler::ExtractionWarning`]s instead.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Rendered document is empty")]
    EmptyDocument,
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, CrawlOutcome, CrawlReport};
pub use state::CrawlState;
pub use storage::QuoteRecord;

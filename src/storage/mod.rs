//! Storage module for persisting harvested quotes
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Batch insertion of extracted quotes
//! - Crawl run tracking
//! - Read helpers for statistics

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{QuoteStore, StorageError, StorageResult};

use std::path::Path;
use std::time::Duration;

/// Opens a store and makes sure its tables exist
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
/// * `busy_timeout` - How long a write waits on a database locked by another process
pub fn open_store(path: &Path, busy_timeout: Duration) -> StorageResult<SqliteStore> {
    let store = SqliteStore::new(path, busy_timeout)?;
    store.ensure_schema()?;
    Ok(store)
}

/// A single quote, as extracted from a page or as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRecord {
    /// Row id; `None` until the record has been inserted
    pub id: Option<i64>,
    pub text: String,
    pub author: String,
    pub tags: Vec<String>,
}

impl QuoteRecord {
    /// Creates an unsaved record
    pub fn new(text: impl Into<String>, author: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            author: author.into(),
            tags,
        }
    }

    /// Tags in their stored form: comma-joined, empty string when there are none
    ///
    /// Commas inside a tag are not escaped and will split it on the way back.
    pub fn tags_string(&self) -> String {
        self.tags.join(",")
    }

    /// Parses the stored tag column back into a list
    pub fn split_tags(stored: Option<&str>) -> Vec<String> {
        match stored {
            Some(s) if !s.is_empty() => s.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub source_url: String,
    pub status: RunStatus,
    pub pages_visited: u32,
    pub records_extracted: u64,
    pub records_persisted: u64,
    pub error_message: Option<String>,
}

/// Counters written when a run finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub pages_visited: u32,
    pub records_extracted: usize,
    pub records_persisted: usize,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// Every extracted record was persisted
    Completed,
    /// Navigation failed mid-crawl; records from earlier pages were persisted
    Partial,
    /// Cancelled between pages; records so far were persisted
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{QuoteRecord, RunRecord, RunStatus, RunTotals};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Writes are plain appends. Nothing here deduplicates quotes: inserting the
/// same text, author, and tags twice creates two rows with different ids.
pub trait QuoteStore {
    /// Creates the tables if they are absent; safe to call on every run
    fn ensure_schema(&self) -> StorageResult<()>;

    // ===== Quotes =====

    /// Inserts every record as a new row, all or nothing
    ///
    /// # Returns
    ///
    /// The assigned ids, in the same order as `records`. On error no row
    /// from this batch is left in the store.
    fn insert_batch(&mut self, records: &[QuoteRecord]) -> StorageResult<Vec<i64>>;

    /// Counts stored quotes
    fn count_quotes(&self) -> StorageResult<u64>;

    /// Lists all stored quotes in id order
    fn list_quotes(&self) -> StorageResult<Vec<QuoteRecord>>;

    /// Counts distinct author names
    fn count_distinct_authors(&self) -> StorageResult<u64>;

    /// Tag frequencies, most frequent first, ties broken by tag name
    fn tag_counts(&self) -> StorageResult<Vec<(String, u64)>>;

    // ===== Run Management =====

    /// Creates a new crawl run in `running` status
    fn create_run(&mut self, config_hash: &str, source_url: &str) -> StorageResult<i64>;

    /// Records the final status and counters of a run
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: RunTotals,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent runs, newest first
    fn latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}

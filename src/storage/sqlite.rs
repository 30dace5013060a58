//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the QuoteStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{QuoteStore, StorageError, StorageResult};
use crate::storage::{QuoteRecord, RunRecord, RunStatus, RunTotals};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, source_url, status,
     pages_visited, records_extracted, records_persisted, error_message";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database file
    ///
    /// The schema is not touched here; call [`QuoteStore::ensure_schema`].
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `busy_timeout` - How long a statement waits on a lock held by another process
    pub fn new(path: &Path, busy_timeout: Duration) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database with the schema in place
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        source_url: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
        pages_visited: row.get(6)?,
        records_extracted: row.get::<_, i64>(7)? as u64,
        records_persisted: row.get::<_, i64>(8)? as u64,
        error_message: row.get(9)?,
    })
}

impl QuoteStore for SqliteStore {
    fn ensure_schema(&self) -> StorageResult<()> {
        initialize_schema(&self.conn)?;
        Ok(())
    }

    // ===== Quotes =====

    fn insert_batch(&mut self, records: &[QuoteRecord]) -> StorageResult<Vec<i64>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(records.len());

        {
            let mut stmt =
                tx.prepare_cached("INSERT INTO quotes (text, author, tags) VALUES (?1, ?2, ?3)")?;
            for record in records {
                let id = stmt.insert(params![record.text, record.author, record.tags_string()])?;
                ids.push(id);
            }
        }

        // Dropping an uncommitted transaction rolls it back, so any `?` above leaves no rows
        tx.commit()?;

        tracing::debug!("Inserted {} quotes", ids.len());
        Ok(ids)
    }

    fn count_quotes(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn list_quotes(&self) -> StorageResult<Vec<QuoteRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, text, author, tags FROM quotes ORDER BY id")?;

        let rows = stmt.query_map([], |row| {
            let tags: Option<String> = row.get(3)?;
            Ok(QuoteRecord {
                id: Some(row.get(0)?),
                text: row.get(1)?,
                author: row.get(2)?,
                tags: QuoteRecord::split_tags(tags.as_deref()),
            })
        })?;

        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(row?);
        }

        Ok(quotes)
    }

    fn count_distinct_authors(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT author) FROM quotes",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn tag_counts(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tags FROM quotes WHERE tags IS NOT NULL AND tags != ''")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for row in rows {
            for tag in QuoteRecord::split_tags(Some(&row?)) {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }

        let mut counts: Vec<(String, u64)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, source_url: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_runs (started_at, config_hash, source_url, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, source_url, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: RunTotals,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawl_runs SET status = ?1, finished_at = ?2, pages_visited = ?3,
             records_extracted = ?4, records_persisted = ?5, error_message = ?6
             WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                totals.pages_visited,
                totals.records_extracted as i64,
                totals.records_persisted as i64,
                error_message,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM crawl_runs WHERE id = ?1", RUN_COLUMNS))?;

        stmt.query_row(params![run_id], run_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StorageError::RunNotFound(run_id),
                other => StorageError::Sqlite(other),
            })
    }

    fn latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM crawl_runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;

        let rows = stmt.query_map(params![limit as i64], run_from_row)?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?);
        }

        Ok(runs)
    }
}

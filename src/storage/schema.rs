//! Database schema definitions
//!
//! The `quotes` table layout is shared with the record-management service
//! that reads the same file, so its columns must not change shape.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested quotes (read and edited by the record-management service)
CREATE TABLE IF NOT EXISTS quotes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    author TEXT NOT NULL,
    tags TEXT
);

-- One row per crawl execution
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    source_url TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_visited INTEGER NOT NULL DEFAULT 0,
    records_extracted INTEGER NOT NULL DEFAULT 0,
    records_persisted INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_quotes_author ON quotes(author);
"#;

/// Initializes the database schema
///
/// Safe to call on every run; existing tables and rows are left untouched.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

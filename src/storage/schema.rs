//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the checker database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track check runs, one per website per invocation
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    website TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    tier TEXT,
    config_hash TEXT NOT NULL,
    checked INTEGER NOT NULL DEFAULT 0,
    indexed INTEGER NOT NULL DEFAULT 0,
    not_indexed INTEGER NOT NULL DEFAULT 0,
    errored INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_runs_website ON runs(website);

-- One row per terminal URL record
CREATE TABLE IF NOT EXISTS url_checks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    verdict TEXT NOT NULL,
    tier TEXT,
    checked_at TEXT NOT NULL,
    error TEXT,
    UNIQUE(run_id, position)
);

CREATE INDEX IF NOT EXISTS idx_url_checks_run ON url_checks(run_id);
CREATE INDEX IF NOT EXISTS idx_url_checks_url ON url_checks(url);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

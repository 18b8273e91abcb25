//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{RunResult, Tier, UrlCheckRecord, Verdict};
use crate::state::RunState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CheckRow, RunRecord};
use crate::CheckerError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, website, started_at, finished_at, status, tier, config_hash, \
                           checked, indexed, not_indexed, errored";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CheckerError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CheckerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Several runs write concurrently through one mutex; WAL keeps readers
        // (--stats) from blocking them.
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, CheckerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        website: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        status: RunState::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunState::Running),
        tier: row
            .get::<_, Option<String>>(5)?
            .as_deref()
            .and_then(Tier::from_db_string),
        config_hash: row.get(6)?,
        checked: row.get::<_, i64>(7)? as u64,
        indexed: row.get::<_, i64>(8)? as u64,
        not_indexed: row.get::<_, i64>(9)? as u64,
        errored: row.get::<_, i64>(10)? as u64,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, website: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (website, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![website, now, config_hash, RunState::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn latest_run(&self, website: &str) -> StorageResult<Option<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM runs WHERE website = ?1 ORDER BY id DESC LIMIT 1",
            RUN_COLUMNS
        );
        let run = self
            .conn
            .query_row(&sql, params![website], run_from_row)
            .optional()?;
        Ok(run)
    }

    fn latest_runs(&self) -> StorageResult<Vec<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM runs WHERE id IN (SELECT MAX(id) FROM runs GROUP BY website) \
             ORDER BY website",
            RUN_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn finish_run(&mut self, run_id: i64, result: &RunResult) -> StorageResult<()> {
        let status = RunState::from(result.status);
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, tier = ?3, checked = ?4, \
             indexed = ?5, not_indexed = ?6, errored = ?7 WHERE id = ?8",
            params![
                status.to_db_string(),
                result.finished_at.to_rfc3339(),
                result.tier.map(|t| t.as_str()),
                result.checked as i64,
                result.indexed as i64,
                result.not_indexed as i64,
                result.errored as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Check Management =====

    fn record_check(&mut self, run_id: i64, record: &UrlCheckRecord) -> StorageResult<bool> {
        if !record.is_terminal() {
            return Err(StorageError::NotTerminal(record.url.clone()));
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO url_checks (run_id, position, url, verdict, tier, checked_at, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                record.position as i64,
                record.url,
                record.verdict.unwrap_or(Verdict::Unknown).as_str(),
                record.tier.map(|t| t.as_str()),
                record.checked_at.to_rfc3339(),
                record.error
            ],
        )?;
        Ok(inserted > 0)
    }

    fn list_checks(&self, run_id: i64) -> StorageResult<Vec<CheckRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, position, url, verdict, tier, checked_at, error
             FROM url_checks WHERE run_id = ?1 ORDER BY position",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(CheckRow {
                    run_id: row.get(0)?,
                    position: row.get::<_, i64>(1)? as u64,
                    url: row.get(2)?,
                    verdict: Verdict::from_db_string(&row.get::<_, String>(3)?)
                        .unwrap_or(Verdict::Unknown),
                    tier: row
                        .get::<_, Option<String>>(4)?
                        .as_deref()
                        .and_then(Tier::from_db_string),
                    checked_at: row.get(5)?,
                    error: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn count_checks(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM url_checks WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

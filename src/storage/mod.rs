//! Storage module for persisting check results
//!
//! This module handles all database operations for the checker, including:
//! - SQLite database initialization and schema management
//! - Run tracking (website, status, tier, counts, config hash)
//! - Per-URL check persistence, idempotent on redelivery

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::model::{Tier, Verdict};
use crate::state::RunState;
use crate::CheckerError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(CheckerError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, CheckerError> {
    SqliteStorage::new(path)
}

/// Represents a check run in the database
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub website: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunState,
    pub tier: Option<Tier>,
    pub config_hash: String,
    pub checked: u64,
    pub indexed: u64,
    pub not_indexed: u64,
    pub errored: u64,
}

/// Represents one persisted URL check
#[derive(Debug, Clone)]
pub struct CheckRow {
    pub run_id: i64,
    pub position: u64,
    pub url: String,
    pub verdict: Verdict,
    pub tier: Option<Tier>,
    pub checked_at: String,
    pub error: Option<String>,
}

//! Database connection management
//!
//! Opens SQLite connections with foreign-key enforcement switched on and
//! verified. The mapping relies on ON DELETE actions, so a connection
//! where the pragma does not stick is refused.

use crate::errors::{from_rusqlite, Result};
use relmap_core::errors::{ExError, ExErrorKind};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long a statement waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Switch file databases to WAL journaling
    #[serde(default = "default_wal")]
    pub wal: bool,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_wal() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
            wal: default_wal(),
        }
    }
}

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(|e| from_rusqlite(e).with_op("open"))
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(|e| from_rusqlite(e).with_op("open"))
}

/// Apply `config` and enable foreign keys
pub fn configure(conn: &Connection, config: &StoreConfig) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(from_rusqlite)?;

    conn.pragma_update(None, "foreign_keys", true)
        .map_err(from_rusqlite)?;
    if !foreign_keys_enabled(conn)? {
        return Err(ExError::new(ExErrorKind::ConnectionFailure)
            .with_op("configure")
            .with_message("foreign key enforcement could not be enabled"));
    }

    if config.wal {
        // journal_mode answers with the resulting mode
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(from_rusqlite)?;
        tracing::debug!(journal_mode = %mode, "journal mode set");
    }

    Ok(())
}

/// Whether `PRAGMA foreign_keys` is on for this connection
pub fn foreign_keys_enabled(conn: &Connection) -> Result<bool> {
    let enabled: i64 = conn
        .pragma_query_value(None, "foreign_keys", |row| row.get(0))
        .map_err(from_rusqlite)?;
    Ok(enabled == 1)
}

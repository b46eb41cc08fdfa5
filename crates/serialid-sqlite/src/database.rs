use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use rusqlite::Connection;
use serialid::{Error, Result};

use crate::error::SqliteResultExt;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS serial_numbers (
    serial_number TEXT PRIMARY KEY,
    region TEXT NOT NULL,
    year INTEGER NOT NULL,
    sequence INTEGER NOT NULL,
    user_id TEXT NOT NULL,
    issued_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS serial_numbers_idx_region_sequence
    ON serial_numbers(region, sequence, year);
CREATE TABLE IF NOT EXISTS sequence_counters (
    partition TEXT PRIMARY KEY,
    highest INTEGER NOT NULL CHECK (highest BETWEEN 0 AND 99999)
);
"#;

/// How long a connection waits on a locked database before giving up with
/// `SQLITE_BUSY`.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A handle to one SQLite database file.
///
/// Holds no connection: every operation opens its own, so handles are cheap
/// to clone and can be shared freely between threads and processes. All
/// coordination happens inside SQLite.
#[derive(Clone, Debug)]
pub struct SqliteDatabase {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteDatabase {
    /// Opens (creating if needed) the database at `path` and applies the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the file cannot be created or
    /// the schema cannot be applied.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like [`SqliteDatabase::open`] with a custom busy timeout.
    ///
    /// # Errors
    ///
    /// Same as [`SqliteDatabase::open`].
    pub fn open_with_busy_timeout(path: impl Into<PathBuf>, busy_timeout: Duration) -> Result<Self> {
        let database = Self {
            path: path.into(),
            busy_timeout,
        };
        database.initialize_schema()?;
        Ok(database)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .or_unavailable("enable write-ahead log")?;
        conn.execute_batch(SCHEMA).or_unavailable("apply schema")
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|err| {
                    Error::unavailable(format!("create {}: {err}", parent.display()))
                })?;
            }
        }
        let conn = Connection::open(&self.path).or_unavailable("open database")?;
        conn.busy_timeout(self.busy_timeout)
            .or_unavailable("set busy timeout")?;
        conn.execute_batch("PRAGMA synchronous = FULL;")
            .or_unavailable("set synchronous mode")?;
        Ok(conn)
    }
}

//! `SQLite` database connection and operations.
//!
//! The database is stored at `~/.nexora/queue.db`. The foreground and the
//! background worker each open their own connection to it, so the file runs
//! in WAL mode with a busy timeout.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::config::Paths;
use crate::error::QueueError;

use super::migrations;

/// How long a writer waits on a lock held by the other context.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at the default location.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::StorageUnavailable`] if the data directory or
    /// file cannot be opened, or an error if migrations fail.
    pub fn open() -> Result<Self, QueueError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        Self::open_at(&paths.database)
    }

    /// Open the database at a specific path.
    ///
    /// Creates the database file and runs migrations if necessary. Opening an
    /// already initialised file is a no-op beyond connecting.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::StorageUnavailable`] if the file cannot be
    /// opened, or an error if migrations fail.
    pub fn open_at(path: &Path) -> Result<Self, QueueError> {
        let conn = Connection::open(path).map_err(|e| {
            QueueError::StorageUnavailable(format!(
                "Failed to open database {}: {e}",
                path.display()
            ))
        })?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| QueueError::Database(format!("Failed to set busy timeout: {e}")))?;

        // journal_mode answers with a row, so it cannot go through execute_batch
        let _mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| {
                QueueError::StorageUnavailable(format!(
                    "Failed to initialise database {}: {e}",
                    path.display()
                ))
            })?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Open an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            QueueError::StorageUnavailable(format!("Failed to open in-memory database: {e}"))
        })?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Run database migrations.
    fn migrate(&self) -> Result<(), QueueError> {
        migrations::run(&self.conn)
    }

    /// Get the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, QueueError> {
        migrations::get_version(&self.conn)
    }

    /// Get a reference to the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

//! Database migrations for nexora-queue.
//!
//! Each migration upgrades the schema by one version. Migrations run
//! automatically when the database is opened, so `open` is idempotent.

use rusqlite::Connection;

use crate::error::QueueError;

/// Current schema version.
const CURRENT_VERSION: i32 = 1;

/// Get the current schema version from the database.
///
/// Returns 0 if no version has been set (new database).
pub fn get_version(conn: &Connection) -> Result<i32, QueueError> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| QueueError::Database(format!("Failed to get schema version: {e}")))?;

    Ok(version)
}

/// Set the schema version in the database.
fn set_version(conn: &Connection, version: i32) -> Result<(), QueueError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| QueueError::Database(format!("Failed to set schema version: {e}")))
}

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<(), QueueError> {
    let current = get_version(conn)?;

    if current >= CURRENT_VERSION {
        return Ok(());
    }

    for version in (current + 1)..=CURRENT_VERSION {
        run_migration(conn, version)?;
        set_version(conn, version)?;
    }

    Ok(())
}

/// Run a specific migration.
fn run_migration(conn: &Connection, version: i32) -> Result<(), QueueError> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(QueueError::Database(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: the operation queue.
///
/// `AUTOINCREMENT` keeps ids strictly increasing and never reused, even after
/// the newest row is deleted.
fn migrate_v1(conn: &Connection) -> Result<(), QueueError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queue_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            retry INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            last_attempt TEXT,
            last_error TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_queue_type
        ON queue(queue_type, id);
        ",
    )
    .map_err(|e| QueueError::Database(format!("Migration v1 failed: {e}")))
}

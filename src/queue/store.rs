//! Durable store for queued operations.
//!
//! Every mutation runs in its own immediate transaction, so a change is
//! either fully committed or not visible at all. Mutations address a single
//! record, which lets concurrent drains of the same type converge: whoever
//! deletes first wins and the other side's update or delete matches no row.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde_json::Value;

use super::item::{QueueItem, QueueType};
use crate::error::QueueError;
use crate::storage::Database;

/// Transactional access to the `queue` table.
pub struct OperationStore {
    db: Database,
}

impl OperationStore {
    /// Open the store at the default location.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::StorageUnavailable`] if the database cannot be
    /// opened.
    pub fn open() -> Result<Self, QueueError> {
        Ok(Self { db: Database::open()? })
    }

    /// Open the store at a specific path.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::StorageUnavailable`] if the database cannot be
    /// opened.
    pub fn open_at(path: &Path) -> Result<Self, QueueError> {
        Ok(Self {
            db: Database::open_at(path)?,
        })
    }

    /// Create a store over an existing database connection.
    #[must_use]
    pub const fn with_database(db: Database) -> Self {
        Self { db }
    }

    /// Append a new record and assign its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails; nothing is written in that case.
    pub fn insert(&self, item: &mut QueueItem) -> Result<i64, QueueError> {
        let payload = serde_json::to_string(&item.payload)?;

        let id = self.write("insert operation", |tx| {
            tx.execute(
                r"INSERT INTO queue (queue_type, payload, retry, created_at)
                  VALUES (?1, ?2, ?3, ?4)",
                params![
                    item.queue_type.as_str(),
                    payload,
                    item.retry,
                    item.created_at.to_rfc3339(),
                ],
            )?;
            Ok(tx.last_insert_rowid())
        })?;

        item.id = Some(id);
        Ok(id)
    }

    /// All records of one type, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn read_all_by_type(&self, queue_type: QueueType) -> Result<Vec<QueueItem>, QueueError> {
        let conn = self.db.connection();

        let mut stmt = conn
            .prepare(
                r"SELECT id, queue_type, payload, retry, created_at, last_attempt, last_error
                  FROM queue
                  WHERE queue_type = ?1
                  ORDER BY id ASC",
            )
            .map_err(|e| QueueError::Database(format!("Failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([queue_type.as_str()], row_to_item)
            .map_err(|e| QueueError::Database(format!("Failed to query operations: {e}")))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row.map_err(|e| QueueError::Database(e.to_string()))?);
        }

        Ok(items)
    }

    /// Get a specific record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, id: i64) -> Result<Option<QueueItem>, QueueError> {
        self.db
            .connection()
            .query_row(
                r"SELECT id, queue_type, payload, retry, created_at, last_attempt, last_error
                  FROM queue
                  WHERE id = ?1",
                [id],
                row_to_item,
            )
            .optional()
            .map_err(|e| QueueError::Database(format!("Failed to query operation: {e}")))
    }

    /// Replace the retry count of an existing record.
    ///
    /// The count never moves backwards: a stale writer racing a newer one
    /// keeps the larger value. Returns `false` when the record is already
    /// gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update_retry(
        &self,
        id: i64,
        retry: u32,
        error: Option<&str>,
    ) -> Result<bool, QueueError> {
        let rows = self.write("update retry", |tx| {
            tx.execute(
                r"UPDATE queue SET
                  retry = MAX(retry, ?1),
                  last_attempt = ?2,
                  last_error = ?3
                  WHERE id = ?4",
                params![retry, Utc::now().to_rfc3339(), error, id],
            )
        })?;

        Ok(rows > 0)
    }

    /// Remove a record. Returns `false` if it was already absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete(&self, id: i64) -> Result<bool, QueueError> {
        let rows = self.write("delete operation", |tx| {
            tx.execute("DELETE FROM queue WHERE id = ?1", [id])
        })?;

        Ok(rows > 0)
    }

    /// Remove every record (for testing/reset). Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear(&self) -> Result<usize, QueueError> {
        self.write("clear queue", |tx| tx.execute("DELETE FROM queue", []))
    }

    /// Pending record count per known type.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn counts_by_type(&self) -> Result<Vec<(QueueType, i64)>, QueueError> {
        let conn = self.db.connection();

        let mut stmt = conn
            .prepare("SELECT queue_type, COUNT(*) FROM queue GROUP BY queue_type")
            .map_err(|e| QueueError::Database(format!("Failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| QueueError::Database(format!("Failed to count operations: {e}")))?;

        let mut counts = Vec::new();
        for row in rows {
            let (name, count) = row.map_err(|e| QueueError::Database(e.to_string()))?;
            // Rows written by something other than this crate are not ours to report
            if let Ok(queue_type) = name.parse::<QueueType>() {
                counts.push((queue_type, count));
            }
        }
        counts.sort_by_key(|(queue_type, _)| *queue_type);

        Ok(counts)
    }

    /// Creation time of the oldest pending record.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn oldest_created_at(&self) -> Result<Option<DateTime<Utc>>, QueueError> {
        let oldest: Option<String> = self
            .db
            .connection()
            .query_row(
                "SELECT created_at FROM queue ORDER BY id ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| QueueError::Database(format!("Failed to get oldest pending: {e}")))?;

        Ok(oldest.as_deref().and_then(parse_timestamp))
    }

    /// Run `f` inside an immediate transaction and commit it.
    fn write<T>(
        &self,
        what: &str,
        f: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
    ) -> Result<T, QueueError> {
        let tx = Transaction::new_unchecked(self.db.connection(), TransactionBehavior::Immediate)
            .map_err(|e| QueueError::Database(format!("Failed to begin transaction: {e}")))?;

        let value = f(&tx).map_err(|e| QueueError::Database(format!("Failed to {what}: {e}")))?;

        tx.commit()
            .map_err(|e| QueueError::Database(format!("Failed to commit {what}: {e}")))?;

        Ok(value)
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

fn row_to_item(row: &Row<'_>) -> Result<QueueItem, rusqlite::Error> {
    let id: i64 = row.get(0)?;
    let queue_type_str: String = row.get(1)?;
    let payload_str: String = row.get(2)?;
    let retry: u32 = row.get(3)?;
    let created_at_str: String = row.get(4)?;
    let last_attempt_str: Option<String> = row.get(5)?;
    let last_error: Option<String> = row.get(6)?;

    let queue_type = queue_type_str.parse::<QueueType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let payload: Value = serde_json::from_str(&payload_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(QueueItem {
        id: Some(id),
        queue_type,
        payload,
        retry,
        created_at: parse_timestamp(&created_at_str).unwrap_or_else(Utc::now),
        last_attempt: last_attempt_str.as_deref().and_then(parse_timestamp),
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_store() -> OperationStore {
        let db = Database::open_in_memory().unwrap();
        OperationStore::with_database(db)
    }

    fn insert(store: &OperationStore, queue_type: QueueType, payload: Value) -> i64 {
        let mut item = QueueItem::new(queue_type, payload);
        store.insert(&mut item).unwrap()
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = create_test_store();

        let mut first = QueueItem::new(QueueType::QuoteCreation, json!({"id": 1}));
        let a = store.insert(&mut first).unwrap();
        assert_eq!(first.id, Some(a));

        let b = insert(&store, QueueType::QuoteCreation, json!({"id": 2}));
        assert!(b > a);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let store = create_test_store();

        let a = insert(&store, QueueType::QuoteCreation, json!({}));
        store.delete(a).unwrap();

        let b = insert(&store, QueueType::QuoteCreation, json!({}));
        assert!(b > a);
    }

    #[test]
    fn test_read_all_by_type_filters_and_orders() {
        let store = create_test_store();

        insert(&store, QueueType::QuoteCreation, json!({"n": 1}));
        insert(&store, QueueType::EvidenceUpload, json!({"n": 2}));
        insert(&store, QueueType::QuoteCreation, json!({"n": 3}));

        let quotes = store.read_all_by_type(QueueType::QuoteCreation).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].payload, json!({"n": 1}));
        assert_eq!(quotes[1].payload, json!({"n": 3}));
        assert!(quotes.iter().all(|i| i.retry == 0));

        let evidence = store.read_all_by_type(QueueType::EvidenceUpload).unwrap();
        assert_eq!(evidence.len(), 1);

        assert!(store
            .read_all_by_type(QueueType::PasswordReset)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_update_retry() {
        let store = create_test_store();
        let id = insert(&store, QueueType::ForgotPassword, json!({"email": "a@b.mx"}));

        assert!(store.update_retry(id, 2, Some("status 503")).unwrap());

        let loaded = store.get(id).unwrap().unwrap();
        assert_eq!(loaded.retry, 2);
        assert_eq!(loaded.last_error.as_deref(), Some("status 503"));
        assert!(loaded.last_attempt.is_some());
        assert_eq!(loaded.payload, json!({"email": "a@b.mx"}));
    }

    #[test]
    fn test_update_retry_never_decreases() {
        let store = create_test_store();
        let id = insert(&store, QueueType::ForgotPassword, json!({}));

        store.update_retry(id, 3, None).unwrap();
        store.update_retry(id, 1, None).unwrap();

        assert_eq!(store.get(id).unwrap().unwrap().retry, 3);
    }

    #[test]
    fn test_update_retry_missing_is_noop() {
        let store = create_test_store();
        assert!(!store.update_retry(999, 1, None).unwrap());
    }

    #[test]
    fn test_delete_idempotent() {
        let store = create_test_store();
        let id = insert(&store, QueueType::PasswordReset, json!({}));

        assert!(store.delete(id).unwrap());
        assert!(!store.delete(id).unwrap());
        assert!(store.get(id).unwrap().is_none());
    }

    #[test]
    fn test_clear_idempotent() {
        let store = create_test_store();

        assert_eq!(store.clear().unwrap(), 0);

        insert(&store, QueueType::QuoteCreation, json!({}));
        insert(&store, QueueType::DocumentRetrieval, json!({}));
        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.clear().unwrap(), 0);
    }

    #[test]
    fn test_counts_by_type() {
        let store = create_test_store();

        insert(&store, QueueType::EvidenceUpload, json!({}));
        insert(&store, QueueType::QuoteCreation, json!({}));
        insert(&store, QueueType::EvidenceUpload, json!({}));

        let counts = store.counts_by_type().unwrap();
        assert_eq!(
            counts,
            vec![(QueueType::QuoteCreation, 1), (QueueType::EvidenceUpload, 2)]
        );
        assert!(store.oldest_created_at().unwrap().is_some());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");

        let id = {
            let store = OperationStore::open_at(&path).unwrap();
            insert(&store, QueueType::EvidenceUpload, json!({"photo": "p1.jpg"}))
        };

        let store = OperationStore::open_at(&path).unwrap();
        let items = store.read_all_by_type(QueueType::EvidenceUpload).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, Some(id));
        assert_eq!(items[0].payload, json!({"photo": "p1.jpg"}));
    }
}

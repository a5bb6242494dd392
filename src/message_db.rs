// src/message_db.rs
//
// SQLite-backed persistence for received messages.
//
// The durable table is the system of record for replay and audit; the
// in-memory retention queue is only a cache of it. Rows are created on
// insert and deleted individually or by the expiry sweep; there is no
// update-in-place.
//
// Timestamps are integer microseconds since the UNIX epoch: deletes key
// on exact (message, timestamp_us) equality, which a float column cannot
// guarantee across a serialization boundary.

use rusqlite::{params, Connection};
use std::path::Path;

use crate::io::IoError;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message TEXT NOT NULL,
    timestamp_us INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_ts ON messages (timestamp_us);
";

/// Persistence adapter for the receiver's message table.
///
/// rusqlite's `Connection` is `!Sync`; callers that share an adapter
/// between tasks wrap it in a `Mutex`.
pub struct MessageDb {
    conn: Option<Connection>,
}

impl MessageDb {
    /// Open (creating if absent) the message database at `path` and
    /// idempotently ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, IoError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    IoError::storage(format!("Failed to create database dir: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| IoError::storage(format!("Failed to open message database: {}", e)))?;

        // WAL mode for concurrent read/write
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| IoError::storage(format!("Failed to set WAL mode: {}", e)))?;
        // Synchronous NORMAL is safe with WAL and faster than FULL
        conn.execute_batch("PRAGMA synchronous=NORMAL;")
            .map_err(|e| IoError::storage(format!("Failed to set synchronous mode: {}", e)))?;

        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| IoError::storage(format!("Failed to create schema: {}", e)))?;

        Ok(MessageDb { conn: Some(conn) })
    }

    /// In-memory database for tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self, IoError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| IoError::storage(format!("Failed to open in-memory db: {}", e)))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| IoError::storage(format!("Failed to create schema: {}", e)))?;
        Ok(MessageDb { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&Connection, IoError> {
        self.conn
            .as_ref()
            .ok_or_else(|| IoError::storage("Database is closed"))
    }

    /// Durable append; returns once the row is committed.
    pub fn insert(&self, content: &str, timestamp_us: u64) -> Result<(), IoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached("INSERT INTO messages (message, timestamp_us) VALUES (?1, ?2)")
            .map_err(|e| IoError::storage(format!("Failed to prepare insert: {}", e)))?;
        stmt.execute(params![content, timestamp_us as i64])
            .map_err(|e| IoError::storage(format!("Failed to insert message: {}", e)))?;
        Ok(())
    }

    /// Full scan in insertion (rowid) order.
    pub fn load_all(&self) -> Result<Vec<(String, u64)>, IoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached("SELECT message, timestamp_us FROM messages ORDER BY id")
            .map_err(|e| IoError::storage(format!("Failed to prepare select: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(|e| IoError::storage(format!("Failed to query messages: {}", e)))?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.map_err(|e| IoError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(messages)
    }

    /// Delete row(s) matching the exact `(content, timestamp_us)` identity.
    /// Returns the number of rows removed.
    pub fn delete(&self, content: &str, timestamp_us: u64) -> Result<usize, IoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached("DELETE FROM messages WHERE message = ?1 AND timestamp_us = ?2")
            .map_err(|e| IoError::storage(format!("Failed to prepare delete: {}", e)))?;
        let n = stmt
            .execute(params![content, timestamp_us as i64])
            .map_err(|e| IoError::storage(format!("Failed to delete message: {}", e)))?;
        Ok(n)
    }

    /// Bulk delete of rows whose age meets or exceeds `ttl_us`.
    /// Independent of the in-memory retention sweep.
    pub fn delete_expired(&self, now_us: u64, ttl_us: u64) -> Result<usize, IoError> {
        let conn = self.conn()?;
        let cutoff = now_us.saturating_sub(ttl_us);
        let mut stmt = conn
            .prepare_cached("DELETE FROM messages WHERE timestamp_us <= ?1")
            .map_err(|e| IoError::storage(format!("Failed to prepare expiry delete: {}", e)))?;
        let n = stmt
            .execute(params![cutoff as i64])
            .map_err(|e| IoError::storage(format!("Failed to delete expired: {}", e)))?;
        Ok(n)
    }

    /// Release the connection. Safe to call more than once; the second
    /// call is a no-op.
    pub fn close(&mut self) {
        self.conn.take();
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_load_roundtrip() {
        let db = MessageDb::open_in_memory().unwrap();
        db.insert("hello", 1_000).unwrap();
        db.insert("world", 2_000).unwrap();

        let rows = db.load_all().unwrap();
        assert_eq!(
            rows,
            vec![("hello".to_string(), 1_000), ("world".to_string(), 2_000)]
        );
    }

    #[test]
    fn test_delete_by_identity() {
        let db = MessageDb::open_in_memory().unwrap();
        db.insert("hello", 1_000).unwrap();
        db.insert("hello", 2_000).unwrap();

        // Only the exact (content, timestamp) pair goes away
        let n = db.delete("hello", 1_000).unwrap();
        assert_eq!(n, 1);
        assert_eq!(db.load_all().unwrap(), vec![("hello".to_string(), 2_000)]);

        // Deleting a missing identity is not an error
        assert_eq!(db.delete("hello", 1_000).unwrap(), 0);
    }

    #[test]
    fn test_delete_matches_duplicate_rows() {
        let db = MessageDb::open_in_memory().unwrap();
        db.insert("dup", 5_000).unwrap();
        db.insert("dup", 5_000).unwrap();

        assert_eq!(db.delete("dup", 5_000).unwrap(), 2);
        assert!(db.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_delete_expired_boundary() {
        let db = MessageDb::open_in_memory().unwrap();
        let ttl_us = 600 * 1_000_000u64;
        let now = 10 * ttl_us;
        db.insert("exactly", now - ttl_us).unwrap();
        db.insert("fresh", now - ttl_us + 1).unwrap();

        let n = db.delete_expired(now, ttl_us).unwrap();
        assert_eq!(n, 1);
        let rows = db.load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "fresh");
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut db = MessageDb::open_in_memory().unwrap();
        db.insert("x", 1).unwrap();
        db.close();
        assert!(db.is_closed());
        db.close(); // no-op, must not panic

        let err = db.insert("y", 2).unwrap_err();
        assert!(matches!(err, IoError::Storage { .. }));
    }

    #[test]
    fn test_schema_create_is_idempotent() {
        let dir = std::env::temp_dir().join(format!("tickerwire-test-{}", std::process::id()));
        let path = dir.join("messages.db");
        {
            let db = MessageDb::open(&path).unwrap();
            db.insert("persisted", 42).unwrap();
        }
        // Reopening must keep existing rows and not recreate the table
        let db = MessageDb::open(&path).unwrap();
        assert_eq!(db.load_all().unwrap(), vec![("persisted".to_string(), 42)]);
        drop(db);
        let _ = std::fs::remove_dir_all(&dir);
    }
}

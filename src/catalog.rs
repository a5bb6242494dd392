// src/catalog.rs
//
// Transmitter-side catalog of reusable canned messages.
//
// A small durable table keyed by a surrogate integer id. The transmitter
// UI offers these in a dropdown; the table is seeded with two sample rows
// on first run so the dropdown is never empty.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

use crate::io::IoError;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL
);
";

const SEED_MESSAGES: [&str; 2] = ["Sample message 1", "Sample message 2"];

/// One reusable canned message
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub content: String,
}

/// Durable catalog of canned messages for the transmitter.
pub struct Catalog {
    conn: Option<Connection>,
}

impl Catalog {
    /// Open (creating if absent) the catalog at `path`, ensure the schema,
    /// and seed the sample messages when the table is empty.
    pub fn open(path: &Path) -> Result<Self, IoError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    IoError::storage(format!("Failed to create catalog dir: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| IoError::storage(format!("Failed to open catalog: {}", e)))?;
        Self::init(conn)
    }

    /// In-memory catalog for tests.
    pub fn open_in_memory() -> Result<Self, IoError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| IoError::storage(format!("Failed to open in-memory catalog: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, IoError> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| IoError::storage(format!("Failed to create catalog schema: {}", e)))?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .map_err(|e| IoError::storage(format!("Failed to count catalog rows: {}", e)))?;

        if count == 0 {
            for content in SEED_MESSAGES {
                conn.execute("INSERT INTO messages (content) VALUES (?1)", params![content])
                    .map_err(|e| IoError::storage(format!("Failed to seed catalog: {}", e)))?;
            }
        }

        Ok(Catalog { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&Connection, IoError> {
        self.conn
            .as_ref()
            .ok_or_else(|| IoError::storage("Catalog is closed"))
    }

    /// Add a canned message; returns its surrogate id.
    pub fn add(&self, content: &str) -> Result<i64, IoError> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO messages (content) VALUES (?1)", params![content])
            .map_err(|e| IoError::storage(format!("Failed to add catalog entry: {}", e)))?;
        Ok(conn.last_insert_rowid())
    }

    /// All entries in id order.
    pub fn list(&self) -> Result<Vec<CatalogEntry>, IoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached("SELECT id, content FROM messages ORDER BY id")
            .map_err(|e| IoError::storage(format!("Failed to prepare catalog select: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(CatalogEntry {
                    id: row.get(0)?,
                    content: row.get(1)?,
                })
            })
            .map_err(|e| IoError::storage(format!("Failed to query catalog: {}", e)))?;

        let mut entries = Vec::new();
        for row in rows {
            entries
                .push(row.map_err(|e| IoError::storage(format!("Failed to read entry: {}", e)))?);
        }
        Ok(entries)
    }

    /// Look up one entry by id.
    pub fn get(&self, id: i64) -> Result<Option<CatalogEntry>, IoError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, content FROM messages WHERE id = ?1",
            params![id],
            |row| {
                Ok(CatalogEntry {
                    id: row.get(0)?,
                    content: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(|e| IoError::storage(format!("Failed to get catalog entry: {}", e)))
    }

    /// Delete one entry by id; returns whether a row was removed.
    pub fn delete(&self, id: i64) -> Result<bool, IoError> {
        let conn = self.conn()?;
        let n = conn
            .execute("DELETE FROM messages WHERE id = ?1", params![id])
            .map_err(|e| IoError::storage(format!("Failed to delete catalog entry: {}", e)))?;
        Ok(n > 0)
    }

    /// Release the connection. Safe to call more than once.
    pub fn close(&mut self) {
        self.conn.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeds_samples_when_empty() {
        let catalog = Catalog::open_in_memory().unwrap();
        let entries = catalog.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "Sample message 1");
        assert_eq!(entries[1].content, "Sample message 2");
    }

    #[test]
    fn test_add_assigns_monotonic_ids() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog.add("alpha").unwrap();
        let b = catalog.add("beta").unwrap();
        assert!(b > a);

        let entries = catalog.list().unwrap();
        assert_eq!(entries.last().unwrap().content, "beta");
    }

    #[test]
    fn test_get_and_delete() {
        let catalog = Catalog::open_in_memory().unwrap();
        let id = catalog.add("temporary").unwrap();

        assert_eq!(catalog.get(id).unwrap().unwrap().content, "temporary");
        assert!(catalog.delete(id).unwrap());
        assert!(catalog.get(id).unwrap().is_none());
        assert!(!catalog.delete(id).unwrap());
    }

    #[test]
    fn test_seeding_does_not_duplicate() {
        let dir = std::env::temp_dir().join(format!("tickerwire-cat-{}", std::process::id()));
        let path = dir.join("catalog.db");
        {
            let catalog = Catalog::open(&path).unwrap();
            assert_eq!(catalog.list().unwrap().len(), 2);
        }
        // A second open must not seed again
        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.list().unwrap().len(), 2);
        drop(catalog);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_closed_catalog_reports_storage_error() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        catalog.close();
        catalog.close(); // idempotent
        assert!(matches!(
            catalog.list().unwrap_err(),
            IoError::Storage { .. }
        ));
    }
}

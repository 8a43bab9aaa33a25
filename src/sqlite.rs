// SQLite key-value backend

use crate::backend::{Storage, validate_key};
use crate::models::now_ms;
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Storage backed by a single `kv` table
pub struct SqliteStorage {
    db: Connection,
}

impl SqliteStorage {
    /// Open or create `todostore.db` inside the given directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref();
        fs::create_dir_all(base_path).context("Failed to create storage directory")?;

        let db_path = base_path.join("todostore.db");
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;
        Self::with_connection(db)
    }

    /// In-memory database, gone when dropped
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::with_connection(db)
    }

    fn with_connection(db: Connection) -> Result<Self> {
        let storage = Self { db };
        storage.create_schema()?;
        Ok(storage)
    }

    /// Get a reference to the SQLite database connection
    pub fn db(&self) -> &Connection {
        &self.db
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;

        let value = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get::<_, String>(0))
            .optional()?;

        Ok(value)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;

        self.db.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, now_ms()],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_database() {
        let temp = TempDir::new().unwrap();
        let _storage = SqliteStorage::open(temp.path()).unwrap();
        assert!(temp.path().join("todostore.db").exists());
    }

    #[test]
    fn test_read_missing_key() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert_eq!(storage.read("todos").unwrap(), None);
    }

    #[test]
    fn test_write_replaces_value() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.write("todos", "[]").unwrap();
        storage.write("todos", "[{\"id\":1,\"text\":\"a\"}]").unwrap();

        assert_eq!(storage.read("todos").unwrap().as_deref(), Some("[{\"id\":1,\"text\":\"a\"}]"));

        let rows: i64 = storage
            .db()
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut storage = SqliteStorage::open(temp.path()).unwrap();
            storage.write("darkMode", "true").unwrap();
        }
        let storage = SqliteStorage::open(temp.path()).unwrap();
        assert_eq!(storage.read("darkMode").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_rejects_bad_key() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.write("", "1").is_err());
    }
}

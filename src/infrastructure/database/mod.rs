//! SQLite-backed permission storage

use async_trait::async_trait;
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::application::errors::StorageError;
use crate::domain::traits::{Grants, PermissionStore};

/// Synchronous grant table access
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_tables()?;
        Ok(db)
    }

    pub fn in_memory() -> SqliteResult<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_tables()?;
        Ok(db)
    }

    fn init_tables(&self) -> SqliteResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS grants (
                identity TEXT NOT NULL,
                command TEXT NOT NULL,
                granted_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (identity, command)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_grants_command ON grants(command)",
            [],
        )?;

        Ok(())
    }

    pub fn list_grants(&self) -> SqliteResult<Grants> {
        let mut stmt = self
            .conn
            .prepare("SELECT identity, command FROM grants ORDER BY identity, command")?;

        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut grants = Grants::new();
        for row in rows {
            let (identity, command) = row?;
            grants.entry(identity).or_default().insert(command);
        }
        Ok(grants)
    }

    pub fn add_grant(&self, identity: &str, command: &str) -> SqliteResult<bool> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO grants (identity, command) VALUES (?1, ?2)",
            [identity, command],
        )?;
        Ok(rows > 0)
    }

    pub fn remove_grant(&self, identity: &str, command: &str) -> SqliteResult<bool> {
        let rows = self.conn.execute(
            "DELETE FROM grants WHERE identity = ?1 AND command = ?2",
            [identity, command],
        )?;
        Ok(rows > 0)
    }
}

/// [`PermissionStore`] over a [`Database`]; queries run on the blocking pool
#[derive(Clone)]
pub struct SqlitePermissionStore {
    db: Arc<Mutex<Database>>,
}

impl SqlitePermissionStore {
    /// Open or create the database file. `:memory:` gives a throwaway store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || -> Result<Database, StorageError> {
            if path.as_os_str() == ":memory:" {
                return Ok(Database::in_memory()?);
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Ok(Database::new(&path)?)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))??;

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> SqliteResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let db = db.lock().map_err(|_| StorageError::Poisoned)?;
            f(&*db).map_err(StorageError::from)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

#[async_trait]
impl PermissionStore for SqlitePermissionStore {
    async fn load(&self) -> Result<Grants, StorageError> {
        self.with_db(|db| db.list_grants()).await
    }

    async fn grant(&self, identity: &str, command: &str) -> Result<(), StorageError> {
        let (identity, command) = (identity.to_string(), command.to_string());
        self.with_db(move |db| db.add_grant(&identity, &command)).await?;
        Ok(())
    }

    async fn revoke(&self, identity: &str, command: &str) -> Result<bool, StorageError> {
        let (identity, command) = (identity.to_string(), command.to_string());
        self.with_db(move |db| db.remove_grant(&identity, &command)).await
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_grants() {
        let db = Database::in_memory().unwrap();
        assert!(db.add_grant("a@s.whatsapp.net", "ai").unwrap());
        assert!(!db.add_grant("a@s.whatsapp.net", "ai").unwrap());
        assert!(db.add_grant("g@g.us", "sticker").unwrap());

        let grants = db.list_grants().unwrap();
        assert_eq!(grants.len(), 2);
        assert!(grants["g@g.us"].contains("sticker"));

        assert!(db.remove_grant("a@s.whatsapp.net", "ai").unwrap());
        assert!(!db.remove_grant("a@s.whatsapp.net", "ai").unwrap());
        assert_eq!(db.list_grants().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/grants.db");

        let store = SqlitePermissionStore::open(&path).await.unwrap();
        store.grant("a@s.whatsapp.net", "ai").await.unwrap();
        store.grant("a@s.whatsapp.net", "tts").await.unwrap();
        assert!(store.revoke("a@s.whatsapp.net", "tts").await.unwrap());
        drop(store);

        let reopened = SqlitePermissionStore::open(&path).await.unwrap();
        let grants = reopened.load().await.unwrap();
        assert_eq!(grants["a@s.whatsapp.net"].len(), 1);
        assert!(grants["a@s.whatsapp.net"].contains("ai"));
    }

    #[tokio::test]
    async fn memory_store_starts_empty() {
        let store = SqlitePermissionStore::open(":memory:").await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
        assert!(!store.revoke("x@s.whatsapp.net", "ai").await.unwrap());
    }
}

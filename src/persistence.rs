//! Persistence Port
//!
//! Opaque collection-name → record-array blob store used by the memory store and
//! the scheduler. Every mutation re-serializes the whole collection. That bounds
//! write latency by collection size and is the scaling limit of this design; an
//! append-only log would replace `save` rather than change its meaning.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Collection holding active memory entries
pub const MEMORIES: &str = "memories";
/// Collection holding archived memory entries
pub const MEMORY_ARCHIVE: &str = "memories_archive";
/// Collection holding every known action
pub const ACTIONS: &str = "actions";

/// Storage backend injected into the core
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Load a collection. A missing collection is an empty one; a malformed blob is an error.
    async fn load(&self, collection: &str) -> Result<Vec<Value>>;

    /// Replace a collection with `records`
    async fn save(&self, collection: &str, records: Vec<Value>) -> Result<()>;
}

/// SQLite-backed persistence, one row per collection
pub struct SqlitePersistence {
    conn: Mutex<Connection>,
}

impl SqlitePersistence {
    /// Open or create the database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        info!("Persistence opened: {}", path.display());
        Ok(store)
    }

    /// In-memory database (tests, ephemeral runs)
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                record_count INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            );
            "#,
        )?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for SqlitePersistence {
    async fn load(&self, collection: &str) -> Result<Vec<Value>> {
        let body: Option<String> = {
            let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
            conn.query_row(
                "SELECT body FROM collections WHERE name = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?
        };

        let Some(body) = body else {
            return Ok(vec![]);
        };

        let records: Vec<Value> = serde_json::from_str(&body)
            .with_context(|| format!("Malformed blob for collection '{}'", collection))?;
        debug!("Loaded {} records from {}", records.len(), collection);
        Ok(records)
    }

    async fn save(&self, collection: &str, records: Vec<Value>) -> Result<()> {
        let count = records.len() as i64;
        let body = serde_json::to_string(&records)?;

        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO collections (name, body, record_count, updated_at)
            VALUES (?1, ?2, ?3, unixepoch())
            ON CONFLICT(name) DO UPDATE SET
                body = excluded.body,
                record_count = excluded.record_count,
                updated_at = excluded.updated_at
            "#,
            params![collection, body, count],
        )?;

        debug!("Saved {} records to {}", count, collection);
        Ok(())
    }
}

/// Process-local persistence; contents vanish with the process
#[derive(Default)]
pub struct MemoryPersistence {
    collections: parking_lot::Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored for a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .get(collection)
            .map(|records| records.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn load(&self, collection: &str) -> Result<Vec<Value>> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, collection: &str, records: Vec<Value>) -> Result<()> {
        self.collections.lock().insert(collection.to_string(), records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let store = SqlitePersistence::open_in_memory().unwrap();

        assert!(store.load("things").await.unwrap().is_empty());

        store
            .save("things", vec![json!({"id": "a"}), json!({"id": "b"})])
            .await
            .unwrap();
        let loaded = store.load("things").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1]["id"], "b");

        // Saving replaces the whole collection
        store.save("things", vec![json!({"id": "c"})]).await.unwrap();
        assert_eq!(store.load("things").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_malformed_blob() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO collections (name, body) VALUES ('broken', '{not json')",
                [],
            )
            .unwrap();
        }

        assert!(store.load("broken").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_persistence() {
        let store = MemoryPersistence::new();
        assert!(store.is_empty(ACTIONS));

        store.save(ACTIONS, vec![json!({"id": 1})]).await.unwrap();
        assert_eq!(store.len(ACTIONS), 1);
        assert_eq!(store.load(ACTIONS).await.unwrap()[0]["id"], 1);
    }
}

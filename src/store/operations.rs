use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::store::schema::{initialize_schema, run_migrations};
use crate::store::{CheckpointStore, DeadLetter, DeadLetterStore, PendingSetStore};

/// SQLite-backed state store
#[derive(Clone)]
pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStateStore {
    /// Open (or create) the database file and initialize the schema
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database for testing
    pub fn new_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        initialize_schema(&conn)?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Lock("Failed to acquire connection lock".to_string()))
    }

    /// Add a hash to a pending set; used by the process that watches the mempool
    pub fn add_pending(&self, key: &str, tx_hash: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO pending_transactions (set_key, tx_hash) VALUES (?1, ?2)",
            params![key, tx_hash],
        )?;
        Ok(inserted > 0)
    }

    pub fn pending_count(&self, key: &str) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pending_transactions WHERE set_key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl CheckpointStore for SqliteStateStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let conn = self.lock()?;
        let value: Option<String> = conn
            .query_row("SELECT value FROM checkpoints WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;

        value
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| StoreError::CorruptValue {
                    key: key.to_string(),
                    value: raw.clone(),
                })
            })
            .transpose()
    }

    async fn set(&self, key: &str, value: u64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO checkpoints (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value.to_string()],
        )?;
        debug!("Stored {} = {}", key, value);
        Ok(())
    }
}

#[async_trait]
impl PendingSetStore for SqliteStateStore {
    async fn members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT tx_hash FROM pending_transactions WHERE set_key = ?1 ORDER BY rowid",
        )?;

        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    async fn remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM pending_transactions WHERE set_key = ?1 AND tx_hash = ?2",
            params![key, member],
        )?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl DeadLetterStore for SqliteStateStore {
    async fn record(&self, key: &str, entry: &DeadLetter) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO dead_letter_blocks (dl_key, block_number, attempts, last_error, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key, entry.block_number, entry.attempts, entry.last_error, entry.recorded_at],
        )?;
        Ok(())
    }

    async fn list(&self, key: &str) -> Result<Vec<DeadLetter>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT block_number, attempts, last_error, recorded_at
             FROM dead_letter_blocks WHERE dl_key = ?1 ORDER BY block_number",
        )?;

        let rows = stmt.query_map(params![key], |row| {
            Ok(DeadLetter {
                block_number: row.get(0)?,
                attempts: row.get(1)?,
                last_error: row.get(2)?,
                recorded_at: row.get(3)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    async fn clear(&self, key: &str, block_number: u64) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM dead_letter_blocks WHERE dl_key = ?1 AND block_number = ?2",
            params![key, block_number],
        )?;
        Ok(removed > 0)
    }
}

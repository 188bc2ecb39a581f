//! Persistent pipeline state: the checkpoint, the pending-transaction set and
//! the dead-letter record of blocks that were given up on.
//!
//! Each operation is individually atomic; there is no transaction spanning
//! several of them.

pub mod checkpoint;
pub mod operations;
pub mod schema;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use checkpoint::CheckpointManager;
pub use operations::SqliteStateStore;
pub use schema::{initialize_schema, run_migrations};

/// Integer values by key
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;
    async fn set(&self, key: &str, value: u64) -> Result<(), StoreError>;
}

/// Sets of transaction hashes by key. Another process adds members.
#[async_trait]
pub trait PendingSetStore: Send + Sync {
    async fn members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Returns whether the member was present
    async fn remove(&self, key: &str, member: &str) -> Result<bool, StoreError>;
}

/// A block the ingestion loop stopped retrying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub block_number: u64,
    pub attempts: u32,
    pub last_error: String,
    /// Unix seconds
    pub recorded_at: i64,
}

#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn record(&self, key: &str, entry: &DeadLetter) -> Result<(), StoreError>;
    async fn list(&self, key: &str) -> Result<Vec<DeadLetter>, StoreError>;

    /// Drop the entry for a block that went through after all; returns whether one existed
    async fn clear(&self, key: &str, block_number: u64) -> Result<bool, StoreError>;
}

/// Everything the ingestion loop persists
pub trait StateStore: CheckpointStore + PendingSetStore + DeadLetterStore {}

impl<T: CheckpointStore + PendingSetStore + DeadLetterStore> StateStore for T {}

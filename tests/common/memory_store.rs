use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use evm_transfer_indexer::error::StoreError;
use evm_transfer_indexer::store::{CheckpointStore, DeadLetter, DeadLetterStore, PendingSetStore};

/// In-process state store with switchable failures
#[derive(Default)]
pub struct MemoryStateStore {
    checkpoints: Mutex<HashMap<String, u64>>,
    // insertion sequence keeps members in the order they were added
    pending: Mutex<HashMap<String, BTreeMap<u64, String>>>,
    next_sequence: Mutex<u64>,
    dead_letters: Mutex<HashMap<String, Vec<DeadLetter>>>,
    fail_checkpoint_reads: AtomicBool,
    fail_checkpoint_writes: AtomicBool,
    fail_pending: AtomicBool,
    fail_dead_letters: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoint(self, key: &str, value: u64) -> Self {
        if let Ok(mut checkpoints) = self.checkpoints.lock() {
            checkpoints.insert(key.to_string(), value);
        }
        self
    }

    pub fn add_pending(&self, key: &str, tx_hash: &str) -> Result<bool, StoreError> {
        let mut pending = self.pending.lock().map_err(|_| lock_error())?;
        let set = pending.entry(key.to_string()).or_default();
        if set.values().any(|member| member == tx_hash) {
            return Ok(false);
        }

        let mut sequence = self.next_sequence.lock().map_err(|_| lock_error())?;
        *sequence += 1;
        set.insert(*sequence, tx_hash.to_string());
        Ok(true)
    }

    pub fn fail_checkpoint_reads(&self, fail: bool) {
        self.fail_checkpoint_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_checkpoint_writes(&self, fail: bool) {
        self.fail_checkpoint_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_pending(&self, fail: bool) {
        self.fail_pending.store(fail, Ordering::SeqCst);
    }

    pub fn fail_dead_letters(&self, fail: bool) {
        self.fail_dead_letters.store(fail, Ordering::SeqCst);
    }
}

fn lock_error() -> StoreError {
    StoreError::Lock("memory store mutex poisoned".to_string())
}

fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
    if flag.load(Ordering::SeqCst) {
        Err(StoreError::Unavailable(format!("{} unavailable", what)))
    } else {
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        check(&self.fail_checkpoint_reads, "checkpoint store")?;
        let checkpoints = self.checkpoints.lock().map_err(|_| lock_error())?;
        Ok(checkpoints.get(key).copied())
    }

    async fn set(&self, key: &str, value: u64) -> Result<(), StoreError> {
        check(&self.fail_checkpoint_writes, "checkpoint store")?;
        let mut checkpoints = self.checkpoints.lock().map_err(|_| lock_error())?;
        checkpoints.insert(key.to_string(), value);
        Ok(())
    }
}

#[async_trait]
impl PendingSetStore for MemoryStateStore {
    async fn members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        check(&self.fail_pending, "pending set")?;
        let pending = self.pending.lock().map_err(|_| lock_error())?;
        Ok(pending
            .get(key)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        check(&self.fail_pending, "pending set")?;
        let mut pending = self.pending.lock().map_err(|_| lock_error())?;
        let Some(set) = pending.get_mut(key) else {
            return Ok(false);
        };

        let before = set.len();
        set.retain(|_, value| value != member);
        Ok(set.len() < before)
    }
}

#[async_trait]
impl DeadLetterStore for MemoryStateStore {
    async fn record(&self, key: &str, entry: &DeadLetter) -> Result<(), StoreError> {
        check(&self.fail_dead_letters, "dead-letter store")?;
        let mut dead_letters = self.dead_letters.lock().map_err(|_| lock_error())?;
        let entries = dead_letters.entry(key.to_string()).or_default();
        entries.retain(|existing| existing.block_number != entry.block_number);
        entries.push(entry.clone());
        entries.sort_by_key(|existing| existing.block_number);
        Ok(())
    }

    async fn list(&self, key: &str) -> Result<Vec<DeadLetter>, StoreError> {
        check(&self.fail_dead_letters, "dead-letter store")?;
        let dead_letters = self.dead_letters.lock().map_err(|_| lock_error())?;
        Ok(dead_letters.get(key).cloned().unwrap_or_default())
    }

    async fn clear(&self, key: &str, block_number: u64) -> Result<bool, StoreError> {
        check(&self.fail_dead_letters, "dead-letter store")?;
        let mut dead_letters = self.dead_letters.lock().map_err(|_| lock_error())?;
        let Some(entries) = dead_letters.get_mut(key) else {
            return Ok(false);
        };

        let before = entries.len();
        entries.retain(|existing| existing.block_number != block_number);
        Ok(entries.len() < before)
    }
}

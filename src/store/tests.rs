#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::blockchain::{Block, ChainClient};
    use crate::error::{IndexerError, RpcError, StoreError};
    use crate::models::RawTransaction;
    use crate::store::{
        CheckpointManager, CheckpointStore, DeadLetter, DeadLetterStore, PendingSetStore, SqliteStateStore,
    };

    const KEY: &str = "ERC20_last_block";
    const PENDING: &str = "ERC20_new_tx";

    struct StaticHead(Option<u64>);

    #[async_trait]
    impl ChainClient for StaticHead {
        async fn block_number(&self) -> Result<u64, IndexerError> {
            self.0
                .ok_or_else(|| IndexerError::Rpc(RpcError::Connection("node unreachable".to_string())))
        }

        async fn get_block(&self, height: u64) -> Result<Block, IndexerError> {
            Err(RpcError::BlockNotFound { block_number: height }.into())
        }

        async fn get_transaction(&self, hash: &str) -> Result<RawTransaction, IndexerError> {
            Err(RpcError::TransactionNotFound { hash: hash.to_string() }.into())
        }
    }

    /// SQLite checkpoints whose reads or writes can be switched off
    struct FlakyCheckpoints {
        inner: SqliteStateStore,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl FlakyCheckpoints {
        fn new() -> Self {
            Self {
                inner: SqliteStateStore::new_in_memory().expect("Failed to create store"),
                fail_reads: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl CheckpointStore for FlakyCheckpoints {
        async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("checkpoint store unavailable".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: u64) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("checkpoint store unavailable".to_string()));
            }
            self.inner.set(key, value).await
        }
    }

    #[tokio::test]
    async fn test_sqlite_checkpoint_roundtrip() {
        let store = SqliteStateStore::new_in_memory().expect("Failed to create store");

        assert_eq!(store.get(KEY).await.unwrap(), None);
        store.set(KEY, 17_000_000).await.unwrap();
        store.set(KEY, 17_000_001).await.unwrap();
        assert_eq!(store.get(KEY).await.unwrap(), Some(17_000_001));
        assert_eq!(store.get("BEP20_last_block").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sqlite_corrupt_checkpoint() {
        let store = SqliteStateStore::new_in_memory().expect("Failed to create store");
        {
            let conn = store.lock().unwrap();
            conn.execute(
                "INSERT INTO checkpoints (key, value) VALUES (?1, ?2)",
                rusqlite::params![KEY, "not-a-number"],
            )
            .unwrap();
        }

        let result = store.get(KEY).await;
        assert!(matches!(result, Err(StoreError::CorruptValue { .. })));
    }

    #[tokio::test]
    async fn test_sqlite_pending_set() {
        let store = SqliteStateStore::new_in_memory().expect("Failed to create store");

        assert!(store.add_pending(PENDING, "0xaa").unwrap());
        assert!(store.add_pending(PENDING, "0xbb").unwrap());
        assert!(!store.add_pending(PENDING, "0xaa").unwrap());
        assert!(store.add_pending("BEP20_new_tx", "0xcc").unwrap());

        let mut members = store.members(PENDING).await.unwrap();
        members.sort();
        assert_eq!(members, vec!["0xaa".to_string(), "0xbb".to_string()]);
        assert_eq!(store.pending_count(PENDING).unwrap(), 2);

        // reading does not consume
        assert_eq!(store.members(PENDING).await.unwrap().len(), 2);

        assert!(store.remove(PENDING, "0xaa").await.unwrap());
        assert!(!store.remove(PENDING, "0xaa").await.unwrap());
        assert_eq!(store.members(PENDING).await.unwrap(), vec!["0xbb".to_string()]);
        assert_eq!(store.members("BEP20_new_tx").await.unwrap(), vec!["0xcc".to_string()]);
    }

    #[tokio::test]
    async fn test_sqlite_dead_letters() {
        let store = SqliteStateStore::new_in_memory().expect("Failed to create store");
        let entry = DeadLetter {
            block_number: 42,
            attempts: 3,
            last_error: "Event sink error: Sink unavailable: down".to_string(),
            recorded_at: 1_700_000_000,
        };

        store.record("ERC20_dead_blocks", &entry).await.unwrap();
        store
            .record("ERC20_dead_blocks", &DeadLetter { attempts: 4, ..entry.clone() })
            .await
            .unwrap();

        let entries = store.list("ERC20_dead_blocks").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attempts, 4);
        assert!(store.list("BEP20_dead_blocks").await.unwrap().is_empty());

        assert!(store.clear("ERC20_dead_blocks", 42).await.unwrap());
        assert!(!store.clear("ERC20_dead_blocks", 42).await.unwrap());
        assert!(store.list("ERC20_dead_blocks").await.unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_file_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        tokio_test::block_on(async {
            let store = SqliteStateStore::new(&path).unwrap();
            store.set(KEY, 99).await.unwrap();
            store.add_pending(PENDING, "0x01").unwrap();
        });

        tokio_test::block_on(async {
            let reopened = SqliteStateStore::new(&path).unwrap();
            assert_eq!(reopened.get(KEY).await.unwrap(), Some(99));
            assert_eq!(reopened.members(PENDING).await.unwrap(), vec!["0x01".to_string()]);
        });
    }

    #[tokio::test]
    async fn test_sqlite_pending_members_keep_insertion_order() {
        let store = SqliteStateStore::new_in_memory().expect("Failed to create store");
        // all added within the same second
        for hash in ["0x03", "0x01", "0x02"] {
            assert!(store.add_pending(PENDING, hash).unwrap());
        }
        assert!(!store.add_pending(PENDING, "0x01").unwrap());

        assert_eq!(store.members(PENDING).await.unwrap(), vec!["0x03", "0x01", "0x02"]);
    }

    #[tokio::test]
    async fn test_resume_from_stored_checkpoint() {
        let store = Arc::new(SqliteStateStore::new_in_memory().unwrap());
        store.set(KEY, 100).await.unwrap();
        let mut manager = CheckpointManager::new(store, KEY);

        let resume = manager.resume_height(&StaticHead(Some(500))).await.unwrap();
        assert_eq!(resume, 101);
        assert_eq!(manager.current(), Some(100));
    }

    #[tokio::test]
    async fn test_resume_rejects_checkpoint_at_height_limit() {
        let store = Arc::new(SqliteStateStore::new_in_memory().unwrap());
        store.set(KEY, u64::MAX).await.unwrap();
        let mut manager = CheckpointManager::new(store, KEY);

        let result = manager.resume_height(&StaticHead(Some(500))).await;
        assert!(matches!(result, Err(IndexerError::Store(StoreError::CorruptValue { .. }))));
    }

    #[tokio::test]
    async fn test_resume_without_checkpoint_uses_chain_head() {
        let store = Arc::new(SqliteStateStore::new_in_memory().unwrap());
        let mut manager = CheckpointManager::new(store, KEY);

        assert_eq!(manager.resume_height(&StaticHead(Some(500))).await.unwrap(), 500);
        assert_eq!(manager.current(), None);

        let result = manager.resume_height(&StaticHead(None)).await;
        assert!(matches!(result, Err(IndexerError::Rpc(RpcError::Connection(_)))));
    }

    #[tokio::test]
    async fn test_resume_fails_when_store_unreachable() {
        let store = Arc::new(FlakyCheckpoints::new());
        store.fail_reads.store(true, Ordering::SeqCst);
        let mut manager = CheckpointManager::new(store, KEY);

        let result = manager.resume_height(&StaticHead(Some(500))).await;
        assert!(matches!(result, Err(IndexerError::Store(StoreError::Unavailable(_)))));
    }

    #[tokio::test]
    async fn test_checkpoint_never_moves_backwards() {
        let store = Arc::new(SqliteStateStore::new_in_memory().unwrap());
        let mut manager = CheckpointManager::new(store.clone(), KEY);

        manager.advance(10).await.unwrap();
        manager.advance(11).await.unwrap();
        assert_eq!(store.get(KEY).await.unwrap(), Some(11));

        let result = manager.advance(5).await;
        assert!(matches!(
            result,
            Err(StoreError::CheckpointRegression { current: 11, requested: 5 })
        ));
        assert_eq!(store.get(KEY).await.unwrap(), Some(11));
    }

    #[tokio::test]
    async fn test_failed_write_does_not_move_checkpoint() {
        let store = Arc::new(FlakyCheckpoints::new());
        let mut manager = CheckpointManager::new(store.clone(), KEY);
        manager.advance(10).await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        assert!(manager.advance(11).await.is_err());
        assert_eq!(manager.current(), Some(10));
        assert_eq!(store.get(KEY).await.unwrap(), Some(10));
    }
}

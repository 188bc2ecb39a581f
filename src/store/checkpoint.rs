use std::sync::Arc;

use crate::blockchain::ChainClient;
use crate::error::{IndexerError, StoreError};
use crate::logging::{LogContext, MetricsLogger};
use crate::store::CheckpointStore;

/// Owns the persisted height of the last fully processed block.
///
/// The height never moves backwards within a process lifetime.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    key: String,
    last_advanced: Option<u64>,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn CheckpointStore>, key: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
            last_advanced: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last height recorded by this manager, if any
    pub fn current(&self) -> Option<u64> {
        self.last_advanced
    }

    pub async fn read(&self) -> Result<Option<u64>, StoreError> {
        self.store.get(&self.key).await
    }

    /// Record `height` as fully processed
    pub async fn advance(&mut self, height: u64) -> Result<(), StoreError> {
        if let Some(current) = self.last_advanced {
            if height < current {
                return Err(StoreError::CheckpointRegression {
                    current,
                    requested: height,
                });
            }
        }

        self.store.set(&self.key, height).await?;
        self.last_advanced = Some(height);
        MetricsLogger::log_checkpoint_advanced(&self.key, height);
        Ok(())
    }

    /// First height to process: one past the stored checkpoint, or the chain
    /// head when nothing has been stored yet.
    ///
    /// Both a store failure and an unreadable chain head are fatal here.
    pub async fn resume_height(&mut self, chain: &dyn ChainClient) -> Result<u64, IndexerError> {
        let context = LogContext::new("checkpoint", "resume").with_metadata("key", serde_json::json!(self.key));

        match self.read().await? {
            Some(stored) => {
                let resume = stored.checked_add(1).ok_or_else(|| StoreError::CorruptValue {
                    key: self.key.clone(),
                    value: stored.to_string(),
                })?;
                self.last_advanced = Some(stored);
                context
                    .with_block_number(resume)
                    .info(&format!("Resuming after checkpoint {}", stored));
                Ok(resume)
            }
            None => {
                let head = chain.block_number().await?;
                context
                    .with_block_number(head)
                    .info(&format!("No checkpoint stored, starting at chain head {}", head));
                Ok(head)
            }
        }
    }
}

use std::sync::Arc;

use serde_json::json;

use crate::blockchain::{ChainClient, TransferClassifier};
use crate::error::{IndexerError, StoreError};
use crate::logging::{ErrorLogger, LogContext};
use crate::publisher::EventPublisher;
use crate::store::PendingSetStore;

/// Outcome counts of one pass over the pending set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingReport {
    pub checked: usize,
    pub emitted: usize,
    pub deferred: usize,
}

/// Re-checks transactions that were seen before they were mined.
///
/// A hash leaves the set only after its event has been published. Anything
/// else (fetch failure, still unmined, nothing to emit, publish failure)
/// leaves it for the next pass.
pub struct PendingTracker {
    store: Arc<dyn PendingSetStore>,
    key: String,
}

impl PendingTracker {
    pub fn new(store: Arc<dyn PendingSetStore>, key: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// All hashes currently queued; the set is left untouched
    pub async fn drain(&self) -> Result<Vec<String>, StoreError> {
        self.store.members(&self.key).await
    }

    /// Drop a hash whose event was already published by the block pass
    pub async fn forget(&self, tx_hash: &str) -> Result<bool, StoreError> {
        self.store.remove(&self.key, tx_hash).await
    }

    /// Fetch, classify and publish every queued transaction.
    ///
    /// Only reading the set can fail the pass; per-entry failures are logged
    /// and counted as deferred.
    pub async fn recheck(
        &self,
        chain: &dyn ChainClient,
        classifier: &TransferClassifier,
        publisher: &EventPublisher,
    ) -> Result<PendingReport, StoreError> {
        let hashes = self.drain().await?;
        let mut report = PendingReport {
            checked: hashes.len(),
            ..PendingReport::default()
        };

        for hash in &hashes {
            let context = LogContext::new("pending_tracker", "recheck")
                .with_transaction_hash(hash)
                .with_metadata("set_key", json!(self.key));

            let tx = match chain.get_transaction(hash).await {
                Ok(tx) => tx,
                Err(error) => {
                    ErrorLogger::log_error(&error, Some(context));
                    report.deferred += 1;
                    continue;
                }
            };

            let Some(block_number) = tx.block_number else {
                context.debug("Transaction still unmined, keeping it queued");
                report.deferred += 1;
                continue;
            };

            let Some(event) = classifier.classify(&tx, block_number) else {
                context
                    .with_block_number(block_number)
                    .debug("No transfer to emit, keeping it queued");
                report.deferred += 1;
                continue;
            };

            if let Err(error) = publisher.publish(&event).await {
                ErrorLogger::log_error(&IndexerError::Sink(error), Some(context));
                report.deferred += 1;
                continue;
            }
            report.emitted += 1;

            if let Err(error) = self.forget(hash).await {
                // the event is out; it will be published again on the next pass
                ErrorLogger::log_error(
                    &IndexerError::Store(error),
                    Some(context.with_metadata("phase", json!("remove"))),
                );
            }
        }

        Ok(report)
    }
}

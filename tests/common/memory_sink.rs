use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use evm_transfer_indexer::error::SinkError;
use evm_transfer_indexer::models::TransferEvent;
use evm_transfer_indexer::publisher::EventSink;

/// Records published events in memory; individual txids or the whole sink
/// can be made to fail
#[derive(Default)]
pub struct MemoryEventSink {
    published: Mutex<Vec<(String, TransferEvent)>>,
    failing_txids: Mutex<HashSet<String>>,
    fail_all: Mutex<bool>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TransferEvent> {
        self.published
            .lock()
            .map(|published| published.iter().map(|(_, event)| event.clone()).collect())
            .unwrap_or_default()
    }

    pub fn published(&self) -> Vec<(String, TransferEvent)> {
        self.published.lock().map(|published| published.clone()).unwrap_or_default()
    }

    pub fn fail_txid(&self, txid: &str) {
        if let Ok(mut failing) = self.failing_txids.lock() {
            failing.insert(txid.to_string());
        }
    }

    pub fn fail_all(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_all.lock() {
            *flag = fail;
        }
    }

    pub fn clear_failures(&self) {
        self.fail_all(false);
        if let Ok(mut failing) = self.failing_txids.lock() {
            failing.clear();
        }
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn publish(&self, topic: &str, event: &TransferEvent) -> Result<(), SinkError> {
        let fail_all = *self
            .fail_all
            .lock()
            .map_err(|_| SinkError::Unavailable("sink mutex poisoned".to_string()))?;
        let fail_this = self
            .failing_txids
            .lock()
            .map(|failing| failing.contains(&event.txid))
            .unwrap_or(false);

        if fail_all || fail_this {
            return Err(SinkError::Unavailable(format!("refusing {}", event.txid)));
        }

        self.published
            .lock()
            .map_err(|_| SinkError::Unavailable("sink mutex poisoned".to_string()))?
            .push((topic.to_string(), event.clone()));
        Ok(())
    }
}

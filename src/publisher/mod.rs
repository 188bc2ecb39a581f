//! Downstream delivery of transfer events.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::logging::LogContext;
use crate::models::TransferEvent;

pub use http::HttpEventSink;

/// Destination for transfer events.
///
/// Delivery is at-least-once: a crash between publishing and recording
/// progress re-publishes the same event after restart. Consumers must treat
/// `txid` as an idempotency key.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, topic: &str, event: &TransferEvent) -> Result<(), SinkError>;
}

/// Publishes events to one configured topic
#[derive(Clone)]
pub struct EventPublisher {
    sink: Arc<dyn EventSink>,
    topic: String,
}

impl EventPublisher {
    pub fn new(sink: Arc<dyn EventSink>, topic: &str) -> Self {
        Self {
            sink,
            topic: topic.to_string(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish(&self, event: &TransferEvent) -> Result<(), SinkError> {
        self.sink.publish(&self.topic, event).await?;

        LogContext::new("publisher", "publish")
            .with_network(&event.network)
            .with_block_number(event.block_number)
            .with_transaction_hash(&event.txid)
            .with_currency(&event.currency)
            .with_metadata("value", serde_json::json!(event.value))
            .debug(&format!("Published {} {} transfer to {}", event.value, event.currency, self.topic));

        Ok(())
    }
}

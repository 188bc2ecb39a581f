use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::logging::LogContext;
use crate::models::TransferEvent;
use crate::publisher::EventSink;

const CONTENT_TYPE: &str = "application/vnd.kafka.json.v2+json";

/// Publishes to a Kafka REST proxy: `POST {endpoint}/topics/{topic}` with one
/// record keyed by `txid`
#[derive(Clone)]
pub struct HttpEventSink {
    client: Client,
    endpoint: String,
}

impl HttpEventSink {
    pub fn new(endpoint: &str, timeout_seconds: u64) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        LogContext::new("event_sink", "initialization")
            .with_metadata("endpoint", json!(endpoint))
            .with_metadata("timeout_seconds", json!(timeout_seconds))
            .info("Initializing HTTP event sink");

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SinkConfig) -> Result<Self, SinkError> {
        Self::new(&config.endpoint, config.timeout_seconds)
    }

    pub fn topic_url(&self, topic: &str) -> String {
        format!("{}/topics/{}", self.endpoint, topic)
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn publish(&self, topic: &str, event: &TransferEvent) -> Result<(), SinkError> {
        let body = json!({
            "records": [{ "key": event.txid, "value": event }]
        });

        let response = self
            .client
            .post(self.topic_url(topic))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    SinkError::Unavailable(e.to_string())
                } else {
                    SinkError::Http(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(SinkError::Unavailable(format!("HTTP {}: {}", status.as_u16(), body)))
        } else {
            Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

use std::time::Duration;
use tokio::time::sleep;

use crate::config::RpcConfig;
use crate::error::{IndexerError, SystemError};
use crate::logging::{ErrorLogger, LogContext};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Initial delay between retries in seconds
    pub initial_delay_seconds: u64,
    /// Maximum delay between retries in seconds
    pub max_delay_seconds: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_seconds: 2,
            max_delay_seconds: 30,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Retry policy for JSON-RPC calls, taken from the `[rpc]` section
    pub fn for_rpc(config: &RpcConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_delay_seconds: config.retry_delay_seconds,
            max_delay_seconds: config.max_retry_delay_seconds,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_seconds: 0,
            max_delay_seconds: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Retry mechanism with exponential backoff and jitter
pub struct RetryManager {
    config: RetryConfig,
    operation_name: String,
}

impl RetryManager {
    pub fn new(operation_name: &str, config: RetryConfig) -> Self {
        Self {
            config,
            operation_name: operation_name.to_string(),
        }
    }

    /// Execute an operation, retrying recoverable failures
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, IndexerError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, IndexerError>>,
    {
        let started = std::time::Instant::now();
        let mut last_error = None;

        for attempt in 1..=self.config.max_attempts {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        ErrorLogger::log_recovery_success(
                            &self.operation_name,
                            attempt,
                            started.elapsed().as_millis() as u64,
                        );
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_recoverable() {
                        return Err(error);
                    }

                    ErrorLogger::log_recovery_attempt(&error, attempt, self.config.max_attempts);

                    if attempt >= self.config.max_attempts {
                        last_error = Some(error);
                        break;
                    }

                    let delay = error
                        .retry_delay()
                        .map(|suggested| self.calculate_delay(attempt).min(Duration::from_secs(suggested)))
                        .unwrap_or_else(|| self.calculate_delay(attempt));

                    LogContext::new("retry", &self.operation_name)
                        .with_retry_count(attempt)
                        .with_metadata("delay_ms", serde_json::json!(delay.as_millis() as u64))
                        .debug(&format!(
                            "Retrying in {}ms (attempt {} of {})",
                            delay.as_millis(),
                            attempt,
                            self.config.max_attempts
                        ));

                    sleep(delay).await;
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            IndexerError::System(SystemError::ResourceExhausted(format!(
                "{}: all retry attempts exhausted",
                self.operation_name
            )))
        }))
    }

    /// Calculate delay for the given attempt number
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay_seconds as f64;
        let exponential_delay = base_delay * self.config.backoff_multiplier.powi(attempt as i32 - 1);
        let capped_delay = exponential_delay.min(self.config.max_delay_seconds as f64);

        let final_delay = if self.config.jitter {
            let jitter = capped_delay * 0.1 * (rand::random::<f64>() - 0.5);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use serde_json::json;
use tokio::signal;
use tokio::time::sleep;

use crate::blockchain::{Block, ChainClient, PendingTracker, RpcClient, TransferClassifier};
use crate::config::AppConfig;
use crate::error::IndexerError;
use crate::logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::ContractRegistry;
use crate::publisher::{EventPublisher, HttpEventSink};
use crate::store::{CheckpointManager, DeadLetter, DeadLetterStore, SqliteStateStore, StateStore};

/// Keys and timing of one network's ingestion loop
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub network: String,
    pub checkpoint_key: String,
    pub pending_set_key: String,
    pub dead_letter_key: String,
    /// Wait when the next block does not exist yet
    pub poll_interval: Duration,
    /// Pause between failed attempts at the same block
    pub block_retry_delay: Duration,
    /// Give up on a block after this many consecutive failures; `None` retries forever
    pub max_block_attempts: Option<u32>,
}

impl IngestionSettings {
    pub fn for_network(network: &str) -> Self {
        Self {
            network: network.to_string(),
            checkpoint_key: format!("{}_last_block", network),
            pending_set_key: format!("{}_new_tx", network),
            dead_letter_key: format!("{}_dead_blocks", network),
            poll_interval: Duration::from_secs(7),
            block_retry_delay: Duration::from_secs(1),
            max_block_attempts: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            network: config.network.id.clone(),
            checkpoint_key: config.checkpoint_key(),
            pending_set_key: config.pending_set_key(),
            dead_letter_key: config.dead_letter_key(),
            poll_interval: Duration::from_secs(config.processing.poll_interval_seconds),
            block_retry_delay: Duration::from_secs(config.processing.block_retry_delay_seconds),
            max_block_attempts: config.processing.max_block_attempts,
        }
    }
}

/// What a single iteration of the loop did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The block at `height` does not exist yet
    Waiting { height: u64 },
    /// The block could not be fetched; nothing else ran
    FetchFailed { height: u64, error: String },
    /// The block was fully processed and the checkpoint moved to `height`
    Advanced { height: u64, events: usize },
    /// Processing or the checkpoint write failed; the same height is retried
    /// next iteration. `attempts` counts processing failures only.
    Failed { height: u64, attempts: u32, error: String },
    /// The block failed too often, was recorded as dead and skipped
    DeadLettered { height: u64, attempts: u32 },
}

/// Sequential block ingestion for one network.
///
/// `AWAIT_BLOCK -> PROCESS_PENDING -> PROCESS_BLOCK -> ADVANCE`, one height at
/// a time. Height N+1 is never fetched before N has advanced.
pub struct IngestionLoop {
    chain: Arc<dyn ChainClient>,
    classifier: TransferClassifier,
    publisher: EventPublisher,
    checkpoint: CheckpointManager,
    pending: PendingTracker,
    dead_letters: Arc<dyn DeadLetterStore>,
    settings: IngestionSettings,
    cursor: Option<u64>,
    failed_attempts: u32,
    // recorded as dead, but the checkpoint never moved past it
    dead_lettered: Option<u64>,
    pub shutdown_signal: Arc<AtomicBool>,
}

impl IngestionLoop {
    pub fn new<S: StateStore + 'static>(
        chain: Arc<dyn ChainClient>,
        store: Arc<S>,
        classifier: TransferClassifier,
        publisher: EventPublisher,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            chain,
            classifier,
            publisher,
            checkpoint: CheckpointManager::new(store.clone(), &settings.checkpoint_key),
            pending: PendingTracker::new(store.clone(), &settings.pending_set_key),
            dead_letters: store,
            settings,
            cursor: None,
            failed_attempts: 0,
            dead_lettered: None,
            shutdown_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wire the production collaborators from configuration.
    ///
    /// Fails if the registry, the state database or the HTTP clients cannot
    /// be set up.
    pub fn from_config(config: &AppConfig) -> Result<Self, IndexerError> {
        let registry = ContractRegistry::from_files(
            config.token_list_path(),
            config.abi_path(),
            &config.network.id,
            &config.network.native_symbol,
        )?;
        let chain = RpcClient::from_config(config)?;
        let store = SqliteStateStore::new(&config.store.path)?;
        let sink = HttpEventSink::from_config(&config.sink)?;

        let classifier = TransferClassifier::new(Arc::new(registry), &config.network.id, &config.network.native_symbol)
            .with_confirmations(config.processing.confirmations);
        let publisher = EventPublisher::new(Arc::new(sink), &config.sink.topic);

        Ok(Self::new(
            Arc::new(chain),
            Arc::new(store),
            classifier,
            publisher,
            IngestionSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &IngestionSettings {
        &self.settings
    }

    /// Height the next iteration will request, once started
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    pub fn checkpoint(&self) -> &CheckpointManager {
        &self.checkpoint
    }

    /// Resolve the starting height from the checkpoint or the chain head
    pub async fn start(&mut self) -> Result<u64, IndexerError> {
        let height = self.checkpoint.resume_height(self.chain.as_ref()).await?;
        self.cursor = Some(height);
        self.failed_attempts = 0;

        LogContext::new("ingestion_loop", "start")
            .with_network(&self.settings.network)
            .with_block_number(height)
            .with_metadata("registry_size", json!(self.classifier.registry().len()))
            .info(&format!("Starting ingestion at block {}", height));

        Ok(height)
    }

    /// One iteration at the current cursor. Starts the loop first if needed;
    /// only that startup can return an error.
    pub async fn tick(&mut self) -> Result<TickOutcome, IndexerError> {
        let height = match self.cursor {
            Some(height) => height,
            None => self.start().await?,
        };

        // AWAIT_BLOCK
        let block = match self.chain.get_block(height).await {
            Ok(block) => block,
            Err(error) if error.is_block_not_found() => {
                LogContext::new("ingestion_loop", "await_block")
                    .with_network(&self.settings.network)
                    .with_block_number(height)
                    .info(&format!("Block {} not produced yet", height));
                return Ok(TickOutcome::Waiting { height });
            }
            Err(error) => {
                ErrorLogger::log_error(&error, Some(self.context("await_block", height)));
                return Ok(TickOutcome::FetchFailed {
                    height,
                    error: error.to_string(),
                });
            }
        };

        // PROCESS_PENDING
        match self
            .pending
            .recheck(self.chain.as_ref(), &self.classifier, &self.publisher)
            .await
        {
            Ok(report) => MetricsLogger::log_pending_pass(height, report.checked, report.emitted, report.deferred),
            Err(error) => ErrorLogger::log_error(&IndexerError::from(error), Some(self.context("process_pending", height))),
        }

        // PROCESS_BLOCK
        let monitor = PerformanceMonitor::new("process_block").with_metadata("block_number", json!(height));
        let processed = self.process_block(height, &block).await;
        let duration = monitor.finish_with_result(&processed);
        let events = match processed {
            Ok(events) => events,
            Err(error) => return Ok(self.handle_block_failure(height, error).await),
        };

        // ADVANCE: the block's events are out, a failed write does not count as an attempt
        if let Err(error) = self.checkpoint.advance(height).await {
            let error = IndexerError::from(error);
            ErrorLogger::log_error(
                &error,
                Some(self.context("advance", height).with_metadata("events", json!(events))),
            );
            return Ok(TickOutcome::Failed {
                height,
                attempts: self.failed_attempts,
                error: error.to_string(),
            });
        }

        if self.dead_lettered == Some(height) {
            self.withdraw_dead_letter(height).await;
        }
        self.cursor = Some(height + 1);
        self.failed_attempts = 0;
        MetricsLogger::log_block_processed(height, block.transactions.len(), events, duration);
        Ok(TickOutcome::Advanced { height, events })
    }

    /// Classify and publish every transaction of the block
    async fn process_block(&self, height: u64, block: &Block) -> Result<usize, IndexerError> {
        let mut events = 0;

        for tx in &block.transactions {
            let Some(event) = self.classifier.classify(tx, height) else {
                continue;
            };

            self.publisher.publish(&event).await?;
            events += 1;

            if let Err(error) = self.pending.forget(&event.txid).await {
                ErrorLogger::log_error(
                    &IndexerError::from(error),
                    Some(self.context("process_block", height).with_transaction_hash(&event.txid)),
                );
            }
        }

        Ok(events)
    }

    async fn handle_block_failure(&mut self, height: u64, error: IndexerError) -> TickOutcome {
        self.failed_attempts += 1;
        let attempts = self.failed_attempts;

        ErrorLogger::log_error(
            &error,
            Some(self.context("process_block", height).with_retry_count(attempts)),
        );

        let exhausted = self
            .settings
            .max_block_attempts
            .map_or(false, |max| attempts >= max);
        if !exhausted {
            return TickOutcome::Failed {
                height,
                attempts,
                error: error.to_string(),
            };
        }

        match self.dead_letter(height, attempts, &error).await {
            Ok(()) => {
                self.cursor = Some(height + 1);
                self.failed_attempts = 0;
                TickOutcome::DeadLettered { height, attempts }
            }
            Err(dead_letter_error) => {
                ErrorLogger::log_error(&dead_letter_error, Some(self.context("dead_letter", height)));
                TickOutcome::Failed {
                    height,
                    attempts,
                    error: error.to_string(),
                }
            }
        }
    }

    /// Record the block as dead, then move the checkpoint past it
    async fn dead_letter(&mut self, height: u64, attempts: u32, error: &IndexerError) -> Result<(), IndexerError> {
        let entry = DeadLetter {
            block_number: height,
            attempts,
            last_error: error.to_string(),
            recorded_at: chrono::Utc::now().timestamp(),
        };
        self.dead_letters.record(&self.settings.dead_letter_key, &entry).await?;
        self.dead_lettered = Some(height);

        self.context("dead_letter", height)
            .with_retry_count(attempts)
            .with_metadata("dead_letter_key", json!(self.settings.dead_letter_key))
            .with_metadata("last_error", json!(entry.last_error))
            .error(&format!(
                "ALERT: giving up on block {} after {} attempts, transfers after the failing one were not emitted",
                height, attempts
            ));

        self.checkpoint.advance(height).await?;
        self.dead_lettered = None;
        Ok(())
    }

    /// The block went through on a later attempt; its dead-letter entry is stale
    async fn withdraw_dead_letter(&mut self, height: u64) {
        match self.dead_letters.clear(&self.settings.dead_letter_key, height).await {
            Ok(_) => {
                self.dead_lettered = None;
                self.context("dead_letter", height)
                    .warn(&format!("Block {} was processed after all, dead-letter entry removed", height));
            }
            Err(error) => ErrorLogger::log_error(
                &IndexerError::from(error),
                Some(self.context("dead_letter", height)),
            ),
        }
    }

    /// Run until shutdown is requested. Startup failures are returned; once
    /// running, every failure is logged and the loop keeps going.
    pub async fn run(&mut self) -> Result<(), IndexerError> {
        if self.cursor.is_none() {
            self.start().await?;
        }

        loop {
            if self.shutdown_signal.load(Ordering::Relaxed) {
                info!(
                    "Shutdown requested, stopping ingestion for {} at block {:?}",
                    self.settings.network, self.cursor
                );
                return Ok(());
            }

            match self.tick().await? {
                TickOutcome::Waiting { .. } => sleep(self.settings.poll_interval).await,
                TickOutcome::FetchFailed { .. } | TickOutcome::Failed { .. } => {
                    sleep(self.settings.block_retry_delay).await
                }
                TickOutcome::Advanced { .. } | TickOutcome::DeadLettered { .. } => {}
            }
        }
    }

    /// Set the shutdown flag on Ctrl-C
    pub fn listen_for_shutdown(&self) {
        let shutdown_signal = Arc::clone(&self.shutdown_signal);
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    shutdown_signal.store(true, Ordering::Relaxed);
                }
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });
    }

    /// Request graceful shutdown at the next iteration boundary
    pub fn shutdown(&self) {
        info!("Requesting graceful shutdown");
        self.shutdown_signal.store(true, Ordering::Relaxed);
    }

    fn context(&self, operation: &str, height: u64) -> LogContext {
        LogContext::new("ingestion_loop", operation)
            .with_network(&self.settings.network)
            .with_block_number(height)
    }
}

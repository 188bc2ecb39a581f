pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod publisher;
pub mod retry;
pub mod store;

pub use blockchain::{ChainClient, IngestionLoop, RpcClient, TransferClassifier};
pub use config::{AppConfig, LoggingConfig, ProcessingConfig, RpcConfig, SinkConfig, StoreConfig};
pub use error::{IndexerError, Result};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use models::{ContractRegistry, RawTransaction, TransferEvent};
pub use publisher::{EventPublisher, EventSink};
pub use retry::{RetryConfig, RetryManager};
pub use store::{CheckpointManager, CheckpointStore, PendingSetStore};

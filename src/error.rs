use thiserror::Error;

/// Main error type for the transfer indexer
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Event sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Contract registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("System error: {0}")]
    System(#[from] SystemError),
}

/// Chain RPC errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i32, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Rate limit exceeded, retry after {seconds} seconds")]
    RateLimit { seconds: u64 },

    #[error("Block not found: {block_number}")]
    BlockNotFound { block_number: u64 },

    #[error("Transaction not found: {hash}")]
    TransactionNotFound { hash: String },

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Checkpoint / pending-set / dead-letter store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite failure: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("Corrupt value under key {key}: {value}")]
    CorruptValue { key: String, value: String },

    #[error("Checkpoint regression: current={current}, requested={requested}")]
    CheckpointRegression { current: u64, requested: u64 },

    /// A backend behind the store traits cannot be reached right now
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Downstream event sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sink rejected record: status={status}, body={body}")]
    Rejected { status: u16, body: String },

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Contract registry loading errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid contract address for {symbol}: {address}")]
    InvalidAddress { symbol: String, address: String },

    #[error("Contract interface has no transfer(address,uint256) function")]
    MissingTransferFunction,
}

/// Token call payload decoding errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Selector mismatch: expected={expected}, got={got}")]
    SelectorMismatch { expected: String, got: String },

    #[error("Payload too short: expected at least {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("Non-empty padding bytes in argument {argument}")]
    NonCanonicalPadding { argument: String },

    #[error("ABI decoding failed: {0}")]
    Abi(String),

    #[error("Unexpected argument shape: {0}")]
    UnexpectedArgument(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    MissingValue(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// System-level errors
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Requires immediate attention; the indexer cannot make progress
    Critical,
    /// Affects functionality
    High,
    /// May affect latency or throughput
    Medium,
    /// Mostly informational
    Low,
}

impl IndexerError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            IndexerError::Config(_) => ErrorSeverity::Critical,
            IndexerError::Registry(_) => ErrorSeverity::Critical,
            IndexerError::Store(StoreError::Sqlite(_)) => ErrorSeverity::Critical,
            IndexerError::Store(StoreError::CheckpointRegression { .. }) => ErrorSeverity::Critical,

            IndexerError::Rpc(RpcError::Connection(_)) => ErrorSeverity::High,
            IndexerError::Sink(_) => ErrorSeverity::High,
            IndexerError::Store(StoreError::CorruptValue { .. }) => ErrorSeverity::High,
            IndexerError::Store(StoreError::Unavailable(_)) => ErrorSeverity::High,

            IndexerError::Rpc(RpcError::Timeout { .. }) => ErrorSeverity::Medium,
            IndexerError::Rpc(RpcError::RateLimit { .. }) => ErrorSeverity::Medium,
            IndexerError::Store(StoreError::Lock(_)) => ErrorSeverity::Medium,

            IndexerError::Decode(_) => ErrorSeverity::Low,
            IndexerError::Rpc(RpcError::BlockNotFound { .. }) => ErrorSeverity::Low,
            IndexerError::Rpc(RpcError::TransactionNotFound { .. }) => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }

    /// Check if the error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            IndexerError::Rpc(RpcError::Timeout { .. }) => true,
            IndexerError::Rpc(RpcError::RateLimit { .. }) => true,
            IndexerError::Rpc(RpcError::Connection(_)) => true,
            IndexerError::Rpc(RpcError::Http(e)) => e.is_timeout() || e.is_connect(),
            IndexerError::Sink(SinkError::Unavailable(_)) => true,
            IndexerError::Store(StoreError::Lock(_)) => true,
            IndexerError::Store(StoreError::Unavailable(_)) => true,
            IndexerError::System(SystemError::ResourceExhausted(_)) => true,

            // Block-not-found is the steady-state wait condition, not a fault to retry here
            IndexerError::Rpc(RpcError::BlockNotFound { .. }) => false,
            IndexerError::Config(_) => false,
            IndexerError::Registry(_) => false,
            IndexerError::Decode(_) => false,

            _ => false,
        }
    }

    /// Get suggested retry delay in seconds for recoverable errors
    pub fn retry_delay(&self) -> Option<u64> {
        if !self.is_recoverable() {
            return None;
        }

        match self {
            IndexerError::Rpc(RpcError::RateLimit { seconds }) => Some(*seconds),
            IndexerError::Rpc(RpcError::Timeout { .. }) => Some(5),
            IndexerError::Rpc(RpcError::Connection(_)) => Some(10),
            IndexerError::Store(StoreError::Lock(_)) => Some(1),
            IndexerError::System(SystemError::ResourceExhausted(_)) => Some(30),
            _ => Some(5),
        }
    }

    /// True when the chain reports the requested block does not exist yet
    pub fn is_block_not_found(&self) -> bool {
        matches!(self, IndexerError::Rpc(RpcError::BlockNotFound { .. }))
    }
}

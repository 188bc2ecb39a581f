use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub rpc: RpcConfig,
    pub store: StoreConfig,
    pub sink: SinkConfig,
    pub registry: RegistryConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

/// Network identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network identifier used in token lists, store keys and emitted events (e.g. ERC20, BEP20)
    pub id: String,
    /// Symbol of the chain's native asset (e.g. ETH, BNB)
    pub native_symbol: String,
    /// Use the testnet RPC endpoint
    pub testnet: bool,
}

/// RPC client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Mainnet JSON-RPC endpoint URL
    pub endpoint: String,
    /// Testnet JSON-RPC endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testnet_endpoint: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum number of attempts per call
    pub max_retries: u32,
    /// Initial retry delay in seconds
    pub retry_delay_seconds: u64,
    /// Maximum retry delay in seconds
    pub max_retry_delay_seconds: u64,
}

/// Checkpoint / pending-set store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file path
    pub path: String,
    /// Key holding the last processed block; defaults to `<NETWORK>_last_block`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_key: Option<String>,
    /// Key of the unconfirmed transaction set; defaults to `<NETWORK>_new_tx`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_set_key: Option<String>,
    /// Key of the dead-letter block list; defaults to `<NETWORK>_dead_blocks`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter_key: Option<String>,
}

/// Downstream event sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Base URL of the REST ingestion endpoint
    pub endpoint: String,
    /// Topic the transfer events are published to
    pub topic: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Token list and ABI locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base directory for the token list and the ABI directory
    pub base_dir: String,
    /// Token list file, relative to `base_dir`
    pub token_list_file: String,
    /// ABI directory, relative to `base_dir`; holds `<network>_abi.json`
    pub abi_dir: String,
}

/// Ingestion loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Wait between polls when the next block does not exist yet
    pub poll_interval_seconds: u64,
    /// Placeholder confirmation count stamped on every event
    pub confirmations: u64,
    /// Pause between attempts of a block whose processing failed
    pub block_retry_delay_seconds: u64,
    /// Dead-letter a block after this many consecutive failures; unset retries forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_block_attempts: Option<u32>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
    /// Enable file logging
    pub file_enabled: bool,
    /// Log file path; defaults to `<base_dir>/logs/<network>_parser.log`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Rotate the log file once it reaches this size
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Rotated copies kept next to the log file
    #[serde(default = "default_max_backup_files")]
    pub max_backup_files: u32,
}

fn default_max_file_bytes() -> u64 {
    300_000_000
}

fn default_max_backup_files() -> u32 {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            rpc: RpcConfig::default(),
            store: StoreConfig::default(),
            sink: SinkConfig::default(),
            registry: RegistryConfig::default(),
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            id: "ERC20".to_string(),
            native_symbol: "ETH".to_string(),
            testnet: false,
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            testnet_endpoint: None,
            timeout_seconds: 30,
            max_retries: 5,
            retry_delay_seconds: 2,
            max_retry_delay_seconds: 30,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "./indexer_state.db".to_string(),
            checkpoint_key: None,
            pending_set_key: None,
            dead_letter_key: None,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8082".to_string(),
            topic: "transactions".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_dir: ".".to_string(),
            token_list_file: "token_list.json".to_string(),
            abi_dir: "abi".to_string(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            // average block time on the supported networks
            poll_interval_seconds: 7,
            confirmations: 13,
            block_retry_delay_seconds: 1,
            max_block_attempts: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_enabled: false,
            file_path: None,
            max_file_bytes: default_max_file_bytes(),
            max_backup_files: default_max_backup_files(),
        }
    }
}

/// Native asset symbol for the networks the indexer knows out of the box
pub fn default_native_symbol(network_id: &str) -> Option<&'static str> {
    match network_id.to_ascii_uppercase().as_str() {
        "ERC20" => Some("ETH"),
        "BEP20" => Some("BNB"),
        _ => None,
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    /// Environment variables take precedence over file values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicit configuration file, then apply environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let mut config: AppConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parsing(e.to_string()))?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the TOML file named by `CONFIG_FILE` (default `config.toml`)
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ConfigError::FileNotFound(config_path.clone()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Network
        if let Ok(network) = env::var("NETWORK") {
            if env::var("NATIVE_SYMBOL").is_err() {
                if let Some(symbol) = default_native_symbol(&network) {
                    self.network.native_symbol = symbol.to_string();
                }
            }
            self.network.id = network;
        }
        if let Ok(symbol) = env::var("NATIVE_SYMBOL") {
            self.network.native_symbol = symbol;
        }
        if let Ok(testnet) = env::var("TESTNET") {
            self.network.testnet = parse_flag(&testnet).ok_or(ConfigError::InvalidValue {
                key: "TESTNET".to_string(),
                value: testnet,
            })?;
        }

        // RPC
        if let Ok(endpoint) = env::var("RPC_URL") {
            self.rpc.endpoint = endpoint;
        }
        if let Ok(endpoint) = env::var("RPC_TESTNET_URL") {
            self.rpc.testnet_endpoint = Some(endpoint);
        }
        if let Ok(timeout) = env::var("RPC_TIMEOUT_SECONDS") {
            self.rpc.timeout_seconds = parse_env("RPC_TIMEOUT_SECONDS", timeout)?;
        }
        if let Ok(retries) = env::var("RPC_MAX_RETRIES") {
            self.rpc.max_retries = parse_env("RPC_MAX_RETRIES", retries)?;
        }

        // Store
        if let Ok(path) = env::var("STATE_DB_PATH") {
            self.store.path = path;
        }

        // Sink
        if let Ok(endpoint) = env::var("EVENT_SINK_URL") {
            self.sink.endpoint = endpoint;
        }
        if let Ok(topic) = env::var("KAFKA_TX_TOPIC") {
            self.sink.topic = topic;
        }

        // Registry
        if let Ok(base_dir) = env::var("BASE_DIR") {
            self.registry.base_dir = base_dir;
        }
        if let Ok(file) = env::var("TOKEN_LIST_FILE") {
            self.registry.token_list_file = file;
        }
        if let Ok(dir) = env::var("ABI_DIR") {
            self.registry.abi_dir = dir;
        }

        // Processing
        if let Ok(interval) = env::var("POLL_INTERVAL_SECONDS") {
            self.processing.poll_interval_seconds = parse_env("POLL_INTERVAL_SECONDS", interval)?;
        }
        if let Ok(attempts) = env::var("MAX_BLOCK_ATTEMPTS") {
            self.processing.max_block_attempts = Some(parse_env("MAX_BLOCK_ATTEMPTS", attempts)?);
        }

        // Logging
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(file_enabled) = env::var("LOG_FILE_ENABLED") {
            self.logging.file_enabled = parse_flag(&file_enabled).ok_or(ConfigError::InvalidValue {
                key: "LOG_FILE_ENABLED".to_string(),
                value: file_enabled,
            })?;
        }
        if let Ok(file_path) = env::var("LOG_FILE_PATH") {
            self.logging.file_path = Some(file_path);
        }
        if let Ok(max_bytes) = env::var("LOG_FILE_MAX_BYTES") {
            self.logging.max_file_bytes = parse_env("LOG_FILE_MAX_BYTES", max_bytes)?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "network.id".to_string(),
                value: self.network.id.clone(),
            });
        }
        if self.network.native_symbol.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "network.native_symbol".to_string(),
                value: self.network.native_symbol.clone(),
            });
        }

        let endpoint = self.active_rpc_endpoint();
        if !is_http_url(endpoint) {
            return Err(ConfigError::InvalidUrl(endpoint.to_string()));
        }
        if self.network.testnet && self.rpc.testnet_endpoint.is_none() {
            return Err(ConfigError::MissingValue("rpc.testnet_endpoint".to_string()));
        }

        if self.rpc.timeout_seconds == 0 || self.rpc.timeout_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "rpc.timeout_seconds".to_string(),
                value: self.rpc.timeout_seconds.to_string(),
            });
        }
        if self.rpc.max_retries == 0 || self.rpc.max_retries > 20 {
            return Err(ConfigError::InvalidValue {
                key: "rpc.max_retries".to_string(),
                value: self.rpc.max_retries.to_string(),
            });
        }

        if !is_http_url(&self.sink.endpoint) {
            return Err(ConfigError::InvalidUrl(self.sink.endpoint.clone()));
        }
        if self.sink.topic.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "sink.topic".to_string(),
                value: self.sink.topic.clone(),
            });
        }

        if self.processing.poll_interval_seconds == 0 || self.processing.poll_interval_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "processing.poll_interval_seconds".to_string(),
                value: self.processing.poll_interval_seconds.to_string(),
            });
        }
        if self.processing.max_block_attempts == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "processing.max_block_attempts".to_string(),
                value: "0".to_string(),
            });
        }

        if self.store.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "store.path".to_string(),
                value: self.store.path.clone(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }
        if self.logging.file_enabled {
            if self.log_file_path().is_none() {
                return Err(ConfigError::MissingValue("logging.file_path".to_string()));
            }
            if self.logging.max_file_bytes == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "logging.max_file_bytes".to_string(),
                    value: "0".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Where file logging writes, `None` when it is off or has nowhere to go
    pub fn log_file_path(&self) -> Option<PathBuf> {
        if !self.logging.file_enabled {
            return None;
        }
        match self.logging.file_path.as_deref().map(str::trim) {
            Some("") => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(
                Path::new(&self.registry.base_dir)
                    .join("logs")
                    .join(format!("{}_parser.log", self.network.id.to_lowercase())),
            ),
        }
    }

    /// RPC endpoint selected by the testnet flag
    pub fn active_rpc_endpoint(&self) -> &str {
        match (&self.rpc.testnet_endpoint, self.network.testnet) {
            (Some(testnet), true) => testnet,
            _ => &self.rpc.endpoint,
        }
    }

    pub fn checkpoint_key(&self) -> String {
        self.store
            .checkpoint_key
            .clone()
            .unwrap_or_else(|| format!("{}_last_block", self.network.id))
    }

    pub fn pending_set_key(&self) -> String {
        self.store
            .pending_set_key
            .clone()
            .unwrap_or_else(|| format!("{}_new_tx", self.network.id))
    }

    pub fn dead_letter_key(&self) -> String {
        self.store
            .dead_letter_key
            .clone()
            .unwrap_or_else(|| format!("{}_dead_blocks", self.network.id))
    }

    pub fn token_list_path(&self) -> PathBuf {
        Path::new(&self.registry.base_dir).join(&self.registry.token_list_file)
    }

    /// `<base_dir>/<abi_dir>/<network>_abi.json`
    pub fn abi_path(&self) -> PathBuf {
        Path::new(&self.registry.base_dir)
            .join(&self.registry.abi_dir)
            .join(format!("{}_abi.json", self.network.id.to_lowercase()))
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "t" | "yes" => Some(true),
        "false" | "0" | "f" | "no" => Some(false),
        _ => None,
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

use log::{debug, error, info, trace, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::LoggingConfig;
use crate::error::{ErrorSeverity, IndexerError, SystemError};

/// Structured logging context: renders one JSON object per log line
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_network(self, network: &str) -> Self {
        self.with_metadata("network", json!(network))
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_transaction_hash(self, tx_hash: &str) -> Self {
        self.with_metadata("transaction_hash", json!(tx_hash))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_currency(self, currency: &str) -> Self {
        self.with_metadata("currency", json!(currency))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_retry_count(self, retry_count: u32) -> Self {
        self.with_metadata("retry_count", json!(retry_count))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Wall-clock timer that logs the elapsed time of an operation
pub struct PerformanceMonitor {
    pub start_time: SystemTime,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: SystemTime::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn context(&self, duration: u64) -> LogContext {
        let mut context = LogContext::new("performance", &self.operation).with_duration_ms(duration);
        for (key, value) in &self.metadata {
            context = context.with_metadata(key, value.clone());
        }
        context
    }

    pub fn finish(self) -> u64 {
        let duration = self.elapsed_ms();
        self.context(duration)
            .debug(&format!("Operation completed in {}ms", duration));
        duration
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();
        let context = self.context(duration);

        match result {
            Ok(_) => context.debug(&format!("Operation completed successfully in {}ms", duration)),
            Err(e) => context
                .with_metadata("error", json!(e.to_string()))
                .warn(&format!("Operation failed after {}ms: {}", duration, e)),
        }

        duration
    }
}

/// Error logging utilities
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &IndexerError, context: Option<LogContext>) {
        let severity = error.severity();

        let mut log_context = context.unwrap_or_else(|| LogContext::new("error", "unknown"));
        log_context = log_context
            .with_metadata("error_type", json!(format!("{:?}", error)))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        if let Some(delay) = error.retry_delay() {
            log_context = log_context.with_metadata("retry_delay_seconds", json!(delay));
        }

        let message = format!("Error occurred: {}", error);

        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_context.error(&message),
            ErrorSeverity::Medium => log_context.warn(&message),
            ErrorSeverity::Low => log_context.info(&message),
        }
    }

    pub fn log_recovery_attempt(error: &IndexerError, attempt: u32, max_attempts: u32) {
        let context = LogContext::new("recovery", "retry_attempt")
            .with_retry_count(attempt)
            .with_metadata("max_attempts", json!(max_attempts))
            .with_metadata("error_type", json!(format!("{:?}", error)));

        if attempt == max_attempts {
            context.error(&format!("Final retry attempt failed: {}", error));
        } else {
            context.warn(&format!("Retry attempt {} of {}: {}", attempt, max_attempts, error));
        }
    }

    pub fn log_recovery_success(operation: &str, attempts: u32, total_duration_ms: u64) {
        LogContext::new("recovery", "success")
            .with_metadata("operation", json!(operation))
            .with_retry_count(attempts)
            .with_duration_ms(total_duration_ms)
            .info(&format!(
                "Operation recovered after {} attempts in {}ms",
                attempts, total_duration_ms
            ));
    }
}

/// Pipeline progress metrics, emitted as structured log lines
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_block_processed(block_number: u64, transaction_count: usize, event_count: usize, processing_time_ms: u64) {
        LogContext::new("metrics", "block_processed")
            .with_block_number(block_number)
            .with_metadata("transaction_count", json!(transaction_count))
            .with_metadata("event_count", json!(event_count))
            .with_duration_ms(processing_time_ms)
            .info(&format!(
                "{} transactions parsed in block {}, {} transfers emitted",
                transaction_count, block_number, event_count
            ));
    }

    pub fn log_pending_pass(block_number: u64, checked: usize, emitted: usize, deferred: usize) {
        let context = LogContext::new("metrics", "pending_pass")
            .with_block_number(block_number)
            .with_metadata("checked", json!(checked))
            .with_metadata("emitted", json!(emitted))
            .with_metadata("deferred", json!(deferred));

        if checked > 0 {
            context.info(&format!(
                "Checked {} unconfirmed transactions at block {}: {} emitted, {} deferred",
                checked, block_number, emitted, deferred
            ));
        } else {
            context.trace("No unconfirmed transactions to check");
        }
    }

    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_checkpoint_advanced(key: &str, block_number: u64) {
        LogContext::new("metrics", "checkpoint_advanced")
            .with_block_number(block_number)
            .with_metadata("key", json!(key))
            .debug(&format!("Checkpoint {} advanced to {}", key, block_number));
    }
}

/// Size-capped log file. Once a write would push it past `max_bytes` the file
/// is shifted to `<path>.1`, older copies move up by one and the oldest beyond
/// `max_backups` is dropped.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    max_backups: u32,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open(path: &Path, max_bytes: u64, max_backups: u32) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            max_backups,
            file,
            written,
        })
    }

    fn backup_path(&self, index: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_backups == 0 {
            self.file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        for index in (1..self.max_backups).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Sends every log line to stderr and to the log file
struct ConsoleAndFile {
    file: RotatingFile,
}

impl Write for ConsoleAndFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // a console failure must not cost the file its copy
        let _ = io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}

/// Initialize the `log` backend from the logging configuration.
///
/// Lines always go to stderr; with `log_file` set they are also appended to
/// that file, rotated by size. `RUST_LOG` still overrides the configured level
/// when set.
pub fn init_logging(config: &LoggingConfig, log_file: Option<&Path>) -> Result<(), IndexerError> {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&config.level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    let json_format = config.format == "json";
    builder.format(move |buf, record| {
        let message = record.args().to_string();
        let structured = serde_json::from_str::<Value>(&message).ok();

        match (structured, json_format) {
            (Some(value), true) => writeln!(buf, "{}", value),
            (Some(value), false) => writeln!(
                buf,
                "[{}] [{}:{}] [{}] - {}",
                chrono::Utc::now().format("%d/%m/%Y %H:%M:%S"),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.level(),
                render_pretty(&value)
            ),
            (None, true) => writeln!(
                buf,
                "{}",
                json!({
                    "timestamp": chrono::Utc::now().timestamp(),
                    "level": record.level().to_string(),
                    "target": record.target(),
                    "message": message,
                })
            ),
            (None, false) => writeln!(
                buf,
                "[{}] [{}:{}] [{}] - {}",
                chrono::Utc::now().format("%d/%m/%Y %H:%M:%S"),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.level(),
                message
            ),
        }
    });

    if let Some(path) = log_file {
        let file = RotatingFile::open(path, config.max_file_bytes, config.max_backup_files)
            .map_err(SystemError::FileSystem)?;
        builder.target(env_logger::Target::Pipe(Box::new(ConsoleAndFile { file })));
    }

    builder
        .try_init()
        .map_err(|e| IndexerError::System(SystemError::ResourceExhausted(e.to_string())))?;

    info!("Logging initialized at level {}", config.level);
    Ok(())
}

/// `component/operation: message key=value ...` for human-readable output
fn render_pretty(value: &Value) -> String {
    let Some(object) = value.as_object() else {
        return value.to_string();
    };

    let component = object.get("component").and_then(Value::as_str).unwrap_or("-");
    let operation = object.get("operation").and_then(Value::as_str).unwrap_or("-");
    let message = object.get("message").and_then(Value::as_str).unwrap_or("");

    let mut extras: Vec<String> = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "component" | "operation" | "message" | "level" | "timestamp"))
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    extras.sort();

    if extras.is_empty() {
        format!("{}/{}: {}", component, operation, message)
    } else {
        format!("{}/{}: {} {}", component, operation, message, extras.join(" "))
    }
}

use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::{IndexerError, RpcError};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::RawTransaction;
use crate::retry::{RetryConfig, RetryManager};

/// A block with its full transaction bodies
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub number: u64,
    pub hash: Option<String>,
    pub transactions: Vec<RawTransaction>,
}

/// Read access to an EVM node
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current chain head height
    async fn block_number(&self) -> Result<u64, IndexerError>;

    /// Block at `height` with full transactions; `RpcError::BlockNotFound`
    /// when the chain has not produced it yet
    async fn get_block(&self, height: u64) -> Result<Block, IndexerError>;

    /// Current state of a transaction; `block_number` is `None` while unmined
    async fn get_transaction(&self, hash: &str) -> Result<RawTransaction, IndexerError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    number: String,
    hash: Option<String>,
    transactions: Vec<WireTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTransaction {
    hash: String,
    from: String,
    to: Option<String>,
    value: String,
    input: String,
    block_number: Option<String>,
}

impl TryFrom<WireTransaction> for RawTransaction {
    type Error = RpcError;

    fn try_from(wire: WireTransaction) -> Result<Self, Self::Error> {
        let from = parse_address(&wire.from)?;
        let to = wire.to.as_deref().map(parse_address).transpose()?;
        let value = parse_hex_to_u256(&wire.value)?;
        let input = hex::decode(strip_hex_prefix(&wire.input))
            .map_err(|e| RpcError::InvalidResponse(format!("Invalid input for {}: {}", wire.hash, e)))?;
        let block_number = wire.block_number.as_deref().map(parse_hex_to_u64).transpose()?;

        Ok(RawTransaction {
            hash: wire.hash.to_lowercase(),
            from,
            to,
            value,
            input,
            block_number,
        })
    }
}

impl TryFrom<WireBlock> for Block {
    type Error = RpcError;

    fn try_from(wire: WireBlock) -> Result<Self, Self::Error> {
        let number = parse_hex_to_u64(&wire.number)?;
        let transactions = wire
            .transactions
            .into_iter()
            .map(RawTransaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Block {
            number,
            hash: wire.hash,
            transactions,
        })
    }
}

/// JSON-RPC over HTTP client; every call carries the configured timeout and
/// recoverable failures are retried with backoff
#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
    retry_config: RetryConfig,
}

impl RpcClient {
    pub fn new(endpoint: &str, timeout_seconds: u64, retry_config: RetryConfig) -> Result<Self, RpcError> {
        LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", serde_json::json!(endpoint))
            .with_metadata("timeout_seconds", serde_json::json!(timeout_seconds))
            .info("Initializing RPC client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            timeout_seconds,
            retry_config,
        })
    }

    /// Client for the configured network, testnet endpoint included
    pub fn from_config(config: &AppConfig) -> Result<Self, RpcError> {
        Self::new(
            config.active_rpc_endpoint(),
            config.rpc.timeout_seconds,
            RetryConfig::for_rpc(&config.rpc),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn make_request(&self, method: &str, params: Vec<Value>) -> Result<Value, IndexerError> {
        let context = LogContext::new("rpc_client", "make_request")
            .with_metadata("method", serde_json::json!(method))
            .with_metadata("endpoint", serde_json::json!(self.endpoint));

        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        context.trace(&format!("Sending RPC request: {}", method));

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout { seconds: self.timeout_seconds }
                } else if e.is_connect() {
                    RpcError::Connection(e.to_string())
                } else {
                    RpcError::Http(e)
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcError::RateLimit { seconds: 60 }.into());
        }
        if !status.is_success() {
            let error_msg = format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            );
            return Err(RpcError::Connection(error_msg).into());
        }

        let rpc_response: JsonRpcResponse = response.json().await.map_err(RpcError::Http)?;

        if let Some(error) = rpc_response.error {
            let rpc_error = match error.code {
                -32700 => RpcError::InvalidResponse("Parse error".to_string()),
                -32600 => RpcError::InvalidResponse("Invalid request".to_string()),
                -32602 => RpcError::InvalidResponse("Invalid params".to_string()),
                _ => RpcError::Method { code: error.code, message: error.message },
            };
            return Err(rpc_error.into());
        }

        Ok(rpc_response.result.unwrap_or(Value::Null))
    }

    /// One retried, timed and metered RPC call
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, IndexerError> {
        RetryManager::new(method, self.retry_config.clone())
            .execute(|| async {
                let monitor = PerformanceMonitor::new(&format!("rpc_{}", method));
                let result = self.make_request(method, params.clone()).await;
                let duration = monitor.finish_with_result(&result);
                MetricsLogger::log_rpc_call(method, duration, result.is_ok());
                result
            })
            .await
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn block_number(&self) -> Result<u64, IndexerError> {
        let value = self.call("eth_blockNumber", vec![]).await?;
        let hex_string = value
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("Block number is not a string".to_string()))?;
        let block_number = parse_hex_to_u64(hex_string)?;

        LogContext::new("rpc_client", "block_number")
            .with_block_number(block_number)
            .debug(&format!("Retrieved latest block number: {}", block_number));

        Ok(block_number)
    }

    async fn get_block(&self, height: u64) -> Result<Block, IndexerError> {
        let params = vec![
            Value::String(format!("0x{:x}", height)),
            Value::Bool(true), // full transaction objects
        ];

        let value = self.call("eth_getBlockByNumber", params).await?;
        if value.is_null() {
            return Err(RpcError::BlockNotFound { block_number: height }.into());
        }

        let wire: WireBlock = serde_json::from_value(value).map_err(RpcError::Json)?;
        let block = Block::try_from(wire)?;

        LogContext::new("rpc_client", "get_block")
            .with_block_number(height)
            .with_metadata("transaction_count", serde_json::json!(block.transactions.len()))
            .debug(&format!(
                "Retrieved block {} with {} transactions",
                height,
                block.transactions.len()
            ));

        Ok(block)
    }

    async fn get_transaction(&self, hash: &str) -> Result<RawTransaction, IndexerError> {
        let value = self
            .call("eth_getTransactionByHash", vec![Value::String(hash.to_string())])
            .await?;
        if value.is_null() {
            return Err(RpcError::TransactionNotFound { hash: hash.to_string() }.into());
        }

        let wire: WireTransaction = serde_json::from_value(value).map_err(RpcError::Json)?;
        Ok(RawTransaction::try_from(wire)?)
    }
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Helper function to parse hex string to u64
pub fn parse_hex_to_u64(hex_str: &str) -> Result<u64, RpcError> {
    u64::from_str_radix(strip_hex_prefix(hex_str), 16)
        .map_err(|e| RpcError::InvalidResponse(format!("Invalid quantity {}: {}", hex_str, e)))
}

pub fn parse_hex_to_u256(hex_str: &str) -> Result<U256, RpcError> {
    let digits = strip_hex_prefix(hex_str);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("Invalid quantity {}: {}", hex_str, e)))
}

fn parse_address(value: &str) -> Result<Address, RpcError> {
    Address::from_str(value).map_err(|e| RpcError::InvalidResponse(format!("Invalid address {}: {}", value, e)))
}

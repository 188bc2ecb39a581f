#![allow(dead_code)]

pub mod memory_sink;
pub mod memory_store;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{address, Address, U256};
use async_trait::async_trait;

use evm_transfer_indexer::blockchain::{
    Block, ChainClient, IngestionLoop, IngestionSettings, TokenInterface, TransferClassifier, ERC20_TRANSFER_SELECTOR,
};
use evm_transfer_indexer::error::{IndexerError, RpcError};
use evm_transfer_indexer::models::{ContractRegistry, RawTransaction, TokenListEntry};
use evm_transfer_indexer::publisher::EventPublisher;
use evm_transfer_indexer::store::StateStore;

pub use memory_sink::MemoryEventSink;
pub use memory_store::MemoryStateStore;

pub const NETWORK: &str = "ERC20";
pub const NATIVE: &str = "ETH";
pub const TOPIC: &str = "transactions";

pub const USDT: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
pub const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");
pub const ALICE: Address = address!("1111111111111111111111111111111111111111");
pub const BOB: Address = address!("F977814e90dA44bFA03b6295A0616a897441aceC");

/// In-memory chain with scripted failures
#[derive(Default)]
pub struct MockChain {
    head: Mutex<Option<u64>>,
    blocks: Mutex<HashMap<u64, Block>>,
    transactions: Mutex<HashMap<String, RawTransaction>>,
    failing_blocks: Mutex<HashSet<u64>>,
    failing_transactions: Mutex<HashSet<String>>,
    block_requests: Mutex<Vec<u64>>,
}

impl MockChain {
    pub fn new(head: u64) -> Self {
        let chain = Self::default();
        *chain.head.lock().unwrap() = Some(head);
        chain
    }

    pub fn without_head() -> Self {
        Self::default()
    }

    pub fn add_block(&self, number: u64, transactions: Vec<RawTransaction>) {
        let transactions = transactions
            .into_iter()
            .map(|tx| RawTransaction {
                block_number: Some(number),
                ..tx
            })
            .collect();
        self.blocks.lock().unwrap().insert(
            number,
            Block {
                number,
                hash: Some(format!("0x{:064x}", number)),
                transactions,
            },
        );
    }

    pub fn add_transaction(&self, tx: RawTransaction) {
        self.transactions.lock().unwrap().insert(tx.hash.clone(), tx);
    }

    pub fn fail_block(&self, number: u64) {
        self.failing_blocks.lock().unwrap().insert(number);
    }

    pub fn fail_transaction(&self, hash: &str) {
        self.failing_transactions.lock().unwrap().insert(hash.to_string());
    }

    pub fn block_requests(&self) -> Vec<u64> {
        self.block_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64, IndexerError> {
        self.head
            .lock()
            .unwrap()
            .ok_or_else(|| RpcError::Connection("connection refused".to_string()).into())
    }

    async fn get_block(&self, height: u64) -> Result<Block, IndexerError> {
        self.block_requests.lock().unwrap().push(height);
        if self.failing_blocks.lock().unwrap().contains(&height) {
            return Err(RpcError::Timeout { seconds: 30 }.into());
        }
        self.blocks
            .lock()
            .unwrap()
            .get(&height)
            .cloned()
            .ok_or_else(|| RpcError::BlockNotFound { block_number: height }.into())
    }

    async fn get_transaction(&self, hash: &str) -> Result<RawTransaction, IndexerError> {
        if self.failing_transactions.lock().unwrap().contains(hash) {
            return Err(RpcError::Connection("connection reset".to_string()).into());
        }
        self.transactions
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| RpcError::TransactionNotFound { hash: hash.to_string() }.into())
    }
}

pub fn tx_hash(n: u64) -> String {
    format!("0x{:064x}", n)
}

pub fn native_tx(n: u64, to: Address, wei: U256) -> RawTransaction {
    RawTransaction {
        hash: tx_hash(n),
        from: ALICE,
        to: Some(to),
        value: wei,
        input: Vec::new(),
        block_number: None,
    }
}

pub fn token_tx(n: u64, contract: Address, to: Address, amount: U256) -> RawTransaction {
    RawTransaction {
        hash: tx_hash(n),
        from: ALICE,
        to: Some(contract),
        value: U256::ZERO,
        input: transfer_input(to, amount),
        block_number: None,
    }
}

/// `transfer(address,uint256)` call payload
pub fn transfer_input(to: Address, amount: U256) -> Vec<u8> {
    let mut input = ERC20_TRANSFER_SELECTOR.to_vec();
    input.extend([0u8; 12]);
    input.extend(to.as_slice());
    input.extend(amount.to_be_bytes::<32>());
    input
}

pub fn ether(tenths: u64) -> U256 {
    U256::from(tenths) * U256::from(100_000_000_000_000_000u64)
}

/// Registry tracking USDT (6 decimals) on ERC20; DAI is deliberately absent
pub fn registry() -> Arc<ContractRegistry> {
    let entries = vec![
        TokenListEntry {
            address: format!("{:#x}", USDT),
            network: NETWORK.to_string(),
            symbol: "USDT".to_string(),
            decimal_precision: 6,
        },
        TokenListEntry {
            address: format!("{:#x}", DAI),
            network: "BEP20".to_string(),
            symbol: "DAI".to_string(),
            decimal_precision: 18,
        },
    ];
    Arc::new(
        ContractRegistry::load(&entries, NETWORK, NATIVE, Arc::new(TokenInterface::standard_erc20()))
            .expect("registry loads"),
    )
}

pub fn classifier() -> TransferClassifier {
    TransferClassifier::new(registry(), NETWORK, NATIVE)
}

pub fn fast_settings() -> IngestionSettings {
    IngestionSettings {
        poll_interval: Duration::from_millis(5),
        block_retry_delay: Duration::from_millis(5),
        ..IngestionSettings::for_network(NETWORK)
    }
}

pub fn ingestion_loop<S: StateStore + 'static>(
    chain: Arc<MockChain>,
    store: Arc<S>,
    sink: Arc<MemoryEventSink>,
    settings: IngestionSettings,
) -> IngestionLoop {
    IngestionLoop::new(chain, store, classifier(), EventPublisher::new(sink, TOPIC), settings)
}

pub const STANDARD_ABI_JSON: &str = r#"[
    {"constant":false,"inputs":[{"name":"dst","type":"address"},{"name":"wad","type":"uint256"}],
     "name":"transfer","outputs":[{"name":"","type":"bool"}],"payable":false,
     "stateMutability":"nonpayable","type":"function"},
    {"anonymous":false,"inputs":[{"indexed":true,"name":"src","type":"address"},
     {"indexed":true,"name":"dst","type":"address"},{"indexed":false,"name":"wad","type":"uint256"}],
     "name":"Transfer","type":"event"}
]"#;

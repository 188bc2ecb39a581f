use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Transaction as fetched from the chain, immutable once fetched
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransaction {
    /// 0x-prefixed lowercase hash
    pub hash: String,
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    /// Native value in wei
    pub value: U256,
    /// Call payload; empty for plain value transfers
    pub input: Vec<u8>,
    /// `None` while the transaction is still unmined
    pub block_number: Option<u64>,
}

impl RawTransaction {
    pub fn is_mined(&self) -> bool {
        self.block_number.is_some()
    }
}

/// Canonical transfer record published downstream.
///
/// Serialized as a flat JSON object; consumers deduplicate on `txid`
/// because delivery is at-least-once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferEvent {
    pub from_address: String,
    pub to_address: String,
    pub txid: String,
    /// Same as `txid`
    pub hex: String,
    /// `raw_amount / 10^decimal_precision` as an exact decimal string
    pub value: String,
    pub confirmations: u64,
    pub block_number: u64,
    /// Left for downstream enrichment; always null at emission time
    pub block_hash: Option<String>,
    pub decimal_precision: u32,
    pub currency: String,
    pub network: String,
}

/// What kind of transfer produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Native,
    Token,
}

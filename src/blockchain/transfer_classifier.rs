use std::sync::Arc;

use alloy_primitives::Address;

use crate::logging::LogContext;
use crate::models::{format_units, ContractRegistry, RawTransaction, TransferEvent, TransferKind};

/// Precision of every EVM native asset (wei)
pub const NATIVE_DECIMALS: u32 = 18;

/// Placeholder written into `confirmations`; enrichment happens downstream
pub const DEFAULT_CONFIRMATIONS: u64 = 13;

/// Turns a single transaction into a transfer event, or nothing.
///
/// Holds no mutable state; the registry is shared and read-only.
#[derive(Debug, Clone)]
pub struct TransferClassifier {
    registry: Arc<ContractRegistry>,
    network: String,
    native_symbol: String,
    confirmations: u64,
}

impl TransferClassifier {
    pub fn new(registry: Arc<ContractRegistry>, network: &str, native_symbol: &str) -> Self {
        Self {
            registry,
            network: network.to_string(),
            native_symbol: native_symbol.to_string(),
            confirmations: DEFAULT_CONFIRMATIONS,
        }
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    /// Which transfer shape the payload has, before any lookup or decoding
    pub fn kind(&self, tx: &RawTransaction) -> Option<TransferKind> {
        if tx.input.is_empty() {
            Some(TransferKind::Native)
        } else if tx.input.len() >= 4 && tx.input[..4] == self.registry.transfer_selector() {
            Some(TransferKind::Token)
        } else {
            None
        }
    }

    /// Classify a mined transaction.
    ///
    /// Untracked contracts and undecodable token calls yield `None`; decode
    /// failures are logged and the transaction is skipped for good.
    pub fn classify(&self, tx: &RawTransaction, block_number: u64) -> Option<TransferEvent> {
        match self.kind(tx)? {
            TransferKind::Native => self.classify_native(tx, block_number),
            TransferKind::Token => self.classify_token(tx, block_number),
        }
    }

    fn classify_native(&self, tx: &RawTransaction, block_number: u64) -> Option<TransferEvent> {
        // contract creation without calldata has no recipient to credit
        let to = tx.to?;

        Some(self.event(
            tx,
            &to,
            format_units(tx.value, NATIVE_DECIMALS),
            NATIVE_DECIMALS,
            &self.native_symbol,
            block_number,
        ))
    }

    fn classify_token(&self, tx: &RawTransaction, block_number: u64) -> Option<TransferEvent> {
        let contract = tx.to?;
        let descriptor = self.registry.lookup_address(&contract)?;

        match descriptor.interface.decode_transfer(&tx.input) {
            Ok(decoded) => Some(self.event(
                tx,
                &decoded.destination,
                format_units(decoded.amount, descriptor.decimal_precision),
                descriptor.decimal_precision,
                &descriptor.currency,
                block_number,
            )),
            Err(error) => {
                LogContext::new("transfer_classifier", "decode_transfer")
                    .with_network(&self.network)
                    .with_block_number(block_number)
                    .with_transaction_hash(&tx.hash)
                    .with_address(&descriptor.address)
                    .with_currency(&descriptor.currency)
                    .with_metadata("error", serde_json::json!(error.to_string()))
                    .warn("Skipping token transfer with undecodable payload");
                None
            }
        }
    }

    fn event(
        &self,
        tx: &RawTransaction,
        to: &Address,
        value: String,
        decimal_precision: u32,
        currency: &str,
        block_number: u64,
    ) -> TransferEvent {
        TransferEvent {
            from_address: tx.from.to_checksum(None),
            to_address: to.to_checksum(None),
            txid: tx.hash.clone(),
            hex: tx.hash.clone(),
            value,
            confirmations: self.confirmations,
            block_number,
            block_hash: None,
            decimal_precision,
            currency: currency.to_string(),
            network: self.network.clone(),
        }
    }
}

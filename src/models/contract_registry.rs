use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use alloy_primitives::Address;
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer};

use crate::blockchain::token_abi::TokenInterface;
use crate::error::RegistryError;

/// One record of the token list file.
///
/// Older token lists use `type`, `name` and `decimal` for the network, symbol
/// and precision columns; both spellings are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenListEntry {
    #[serde(default)]
    pub address: String,
    #[serde(alias = "type")]
    pub network: String,
    #[serde(alias = "name")]
    pub symbol: String,
    #[serde(
        rename = "decimalPrecision",
        alias = "decimal",
        alias = "decimals",
        deserialize_with = "deserialize_precision"
    )]
    pub decimal_precision: u32,
}

fn deserialize_precision<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Precision {
        Number(u32),
        Text(String),
    }

    match Precision::deserialize(deserializer)? {
        Precision::Number(value) => Ok(value),
        Precision::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// A tracked token contract
#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    /// Lowercase 0x-prefixed contract address
    pub address: String,
    pub currency: String,
    pub decimal_precision: u32,
    pub interface: Arc<TokenInterface>,
}

/// Immutable map of the token contracts tracked on one network
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    network: String,
    interface: Arc<TokenInterface>,
    contracts: HashMap<String, ContractDescriptor>,
}

impl ContractRegistry {
    /// Build the registry for `network` from a token list.
    ///
    /// Entries for other networks, entries without an address and the native
    /// asset itself are left out. A malformed address fails the whole load.
    pub fn load(
        entries: &[TokenListEntry],
        network: &str,
        native_symbol: &str,
        interface: Arc<TokenInterface>,
    ) -> Result<Self, RegistryError> {
        let mut contracts: HashMap<String, ContractDescriptor> = HashMap::new();

        for entry in entries {
            if !entry.network.eq_ignore_ascii_case(network) {
                continue;
            }
            let raw_address = entry.address.trim();
            if raw_address.is_empty() || entry.symbol.eq_ignore_ascii_case(native_symbol) {
                continue;
            }

            let address = normalize_address(raw_address).ok_or_else(|| RegistryError::InvalidAddress {
                symbol: entry.symbol.clone(),
                address: entry.address.clone(),
            })?;

            if let Some(existing) = contracts.get(&address) {
                warn!(
                    "Duplicate token list entry for {} ({}), keeping {}",
                    address, entry.symbol, existing.currency
                );
                continue;
            }

            debug!("Tracking {} contract {} ({} decimals)", entry.symbol, address, entry.decimal_precision);
            contracts.insert(
                address.clone(),
                ContractDescriptor {
                    address,
                    currency: entry.symbol.clone(),
                    decimal_precision: entry.decimal_precision,
                    interface: Arc::clone(&interface),
                },
            );
        }

        info!("Loaded {} token contracts for network {}", contracts.len(), network);

        Ok(Self {
            network: network.to_string(),
            interface,
            contracts,
        })
    }

    /// Load the token list and the network ABI from disk
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(
        token_list_path: P,
        abi_path: Q,
        network: &str,
        native_symbol: &str,
    ) -> Result<Self, RegistryError> {
        let interface = Arc::new(TokenInterface::from_file(abi_path)?);
        let entries = read_token_list(token_list_path)?;
        Self::load(&entries, network, native_symbol, interface)
    }

    /// Case-insensitive lookup by contract address
    pub fn lookup(&self, address: &str) -> Option<&ContractDescriptor> {
        normalize_address(address.trim()).and_then(|key| self.contracts.get(&key))
    }

    pub fn lookup_address(&self, address: &Address) -> Option<&ContractDescriptor> {
        self.contracts.get(&format!("{:#x}", address))
    }

    pub fn transfer_selector(&self) -> [u8; 4] {
        self.interface.transfer_selector()
    }

    pub fn interface(&self) -> &TokenInterface {
        &self.interface
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

pub fn read_token_list<P: AsRef<Path>>(path: P) -> Result<Vec<TokenListEntry>, RegistryError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let json = fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|source| RegistryError::Parse { path: display, source })
}

/// Lowercase 0x-prefixed form of a 20-byte address, `None` if it does not parse
pub fn normalize_address(address: &str) -> Option<String> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if hex_part.len() != 40 {
        return None;
    }
    let bytes = hex::decode(hex_part).ok()?;
    Some(format!("{:#x}", Address::from_slice(&bytes)))
}

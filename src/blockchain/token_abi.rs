//! Shared token contract interface used to decode `transfer(address,uint256)` calls.
//!
//! Call payloads are `selector(4 bytes) ++ ABI-encoded arguments`. The whole
//! 4-byte selector is compared, never a shorter prefix of it.

use std::fs;
use std::path::Path;

use alloy_core::dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_abi::{Function, JsonAbi};
use alloy_primitives::{Address, U256};
use once_cell::sync::Lazy;

use crate::error::{DecodeError, RegistryError};

/// `keccak256("transfer(address,uint256)")[..4]`
pub const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

const WORD: usize = 32;

static STANDARD_ERC20_ABI: Lazy<JsonAbi> = Lazy::new(|| {
    serde_json::from_str(
        r#"[{"type":"function","name":"transfer","stateMutability":"nonpayable",
            "inputs":[{"name":"_to","type":"address"},{"name":"_value","type":"uint256"}],
            "outputs":[{"name":"","type":"bool"}]}]"#,
    )
    .expect("embedded ERC-20 ABI is valid JSON")
});

/// Destination and raw amount of a decoded token transfer call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransfer {
    pub destination: Address,
    pub amount: U256,
}

/// Decode capability shared by every tracked token on a network
#[derive(Debug, Clone)]
pub struct TokenInterface {
    transfer: Function,
    selector: [u8; 4],
}

impl TokenInterface {
    /// Build from a parsed contract ABI; it must declare `transfer(address,uint256)`
    pub fn from_abi(abi: &JsonAbi) -> Result<Self, RegistryError> {
        let transfer = abi
            .functions()
            .find(|function| is_transfer_function(function))
            .cloned()
            .ok_or(RegistryError::MissingTransferFunction)?;
        let selector = transfer.selector().0;

        Ok(Self { transfer, selector })
    }

    pub fn from_json(json: &str, source: &str) -> Result<Self, RegistryError> {
        let abi: JsonAbi = serde_json::from_str(json).map_err(|source_err| RegistryError::Parse {
            path: source.to_string(),
            source: source_err,
        })?;
        Self::from_abi(&abi)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let json = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json(&json, &display)
    }

    /// Interface with only the standard ERC-20 `transfer` function
    pub fn standard_erc20() -> Self {
        Self::from_abi(&STANDARD_ERC20_ABI).expect("embedded ERC-20 ABI declares transfer")
    }

    /// The complete 4-byte selector of the transfer function
    pub fn transfer_selector(&self) -> [u8; 4] {
        self.selector
    }

    pub fn matches_selector(&self, input: &[u8]) -> bool {
        input.len() >= 4 && input[..4] == self.selector
    }

    /// Decode a `transfer` call payload (selector included).
    ///
    /// Rejects payloads whose static arguments carry non-zero padding, the way
    /// strict ABI decoders do.
    pub fn decode_transfer(&self, input: &[u8]) -> Result<DecodedTransfer, DecodeError> {
        if input.len() < 4 {
            return Err(DecodeError::Truncated { expected: 4, got: input.len() });
        }
        if !self.matches_selector(input) {
            return Err(DecodeError::SelectorMismatch {
                expected: format!("0x{}", hex::encode(self.selector)),
                got: format!("0x{}", hex::encode(&input[..4])),
            });
        }

        let payload = &input[4..];
        let expected = WORD * self.transfer.inputs.len();
        if payload.len() < expected {
            return Err(DecodeError::Truncated { expected: expected + 4, got: input.len() });
        }

        self.check_canonical_padding(payload)?;

        let values = self
            .transfer
            .abi_decode_input(payload, false)
            .map_err(|e| DecodeError::Abi(e.to_string()))?;

        let destination = values
            .iter()
            .find_map(|value| match value {
                DynSolValue::Address(address) => Some(*address),
                _ => None,
            })
            .ok_or_else(|| DecodeError::UnexpectedArgument("no address argument".to_string()))?;
        let amount = values
            .iter()
            .find_map(|value| match value {
                DynSolValue::Uint(amount, _) => Some(*amount),
                _ => None,
            })
            .ok_or_else(|| DecodeError::UnexpectedArgument("no amount argument".to_string()))?;

        Ok(DecodedTransfer { destination, amount })
    }

    fn check_canonical_padding(&self, payload: &[u8]) -> Result<(), DecodeError> {
        for (index, param) in self.transfer.inputs.iter().enumerate() {
            let word = &payload[index * WORD..(index + 1) * WORD];
            let padding = match padding_len(param.ty.as_str()) {
                Some(len) => len,
                None => continue,
            };
            if word[..padding].iter().any(|byte| *byte != 0) {
                let argument = if param.name.is_empty() {
                    format!("#{}", index)
                } else {
                    param.name.clone()
                };
                return Err(DecodeError::NonCanonicalPadding { argument });
            }
        }
        Ok(())
    }
}

fn is_transfer_function(function: &Function) -> bool {
    function.name == "transfer"
        && function.inputs.len() == 2
        && function.inputs[0].ty == "address"
        && function.inputs[1].ty.starts_with("uint")
}

/// Number of leading bytes that must be zero in a right-aligned static word
fn padding_len(ty: &str) -> Option<usize> {
    match ty {
        "address" => Some(12),
        "bool" => Some(31),
        _ => {
            let bits: usize = ty.strip_prefix("uint")?.parse().ok()?;
            Some(WORD - bits / 8)
        }
    }
}

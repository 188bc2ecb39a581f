pub mod amount;
pub mod contract_registry;
pub mod transaction;

pub use amount::format_units;
pub use contract_registry::{normalize_address, read_token_list, ContractDescriptor, ContractRegistry, TokenListEntry};
pub use transaction::{RawTransaction, TransferEvent, TransferKind};

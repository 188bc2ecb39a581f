pub mod ingestion_loop;
pub mod pending_tracker;
pub mod rpc_client;
pub mod token_abi;
pub mod transfer_classifier;

pub use ingestion_loop::{IngestionLoop, IngestionSettings, TickOutcome};
pub use pending_tracker::{PendingReport, PendingTracker};
pub use rpc_client::{Block, ChainClient, RpcClient};
pub use token_abi::{DecodedTransfer, TokenInterface, ERC20_TRANSFER_SELECTOR};
pub use transfer_classifier::{TransferClassifier, DEFAULT_CONFIRMATIONS, NATIVE_DECIMALS};

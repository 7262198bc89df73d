//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key) + config (RPC URLs)
//!     → wallet.rs (key loading, signing)
//!     → client.rs (JSON-RPC connection with timeouts and failover)
//!     → ledger.rs (collaborator traits consumed by the staking workflow)
//!     → utxo.rs (atomic import queues)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod ledger;
pub mod transaction;
pub mod types;
pub mod utxo;
pub mod wallet;

pub use client::LedgerClient;
pub use ledger::{LedgerRpc, UtxoSource};
pub use transaction::{DelegatorParams, ExportParams, ImportParams, SignedTx, TxFactory, UnsignedTx};
pub use types::{Account, BlockchainError, BlockchainResult, Chain, ChainBalance, Network, TxId, TxStatus};
pub use utxo::{AtomicUtxos, UtxoSet};
pub use wallet::{LocalWallet, TxSigner};

//! Chain-specific types and error definitions.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::resilience::Transient;

// Re-export RpcConfig from config module to avoid duplication
pub use crate::config::schema::RpcConfig;

/// Wei per nano unit: the C-Chain uses 18 decimals, the P-Chain 9.
pub const WEI_PER_NANO: u128 = 1_000_000_000;

/// The two chains a staking workflow moves funds between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    /// EVM-compatible balance chain.
    #[serde(rename = "C")]
    C,
    /// Staking chain.
    #[serde(rename = "P")]
    P,
}

impl Chain {
    /// Chain alias used by the node API.
    pub fn alias(&self) -> &'static str {
        match self {
            Chain::C => "C",
            Chain::P => "P",
        }
    }

    /// Number of decimals of the chain's smallest unit.
    pub fn decimals(&self) -> u32 {
        match self {
            Chain::C => 18,
            Chain::P => 9,
        }
    }

    /// The chain on the other side of an atomic transfer.
    pub fn counterpart(&self) -> Chain {
        match self {
            Chain::C => Chain::P,
            Chain::P => Chain::C,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-Chain", self.alias())
    }
}

/// Which network a workflow runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Testnet)
    }

    /// Bech32 human-readable part of P-Chain addresses.
    pub fn hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "avax",
            Network::Testnet => "fuji",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// Transaction identifier as returned by the ledger (a content hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub String);

impl TxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TxId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TxId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The wallet account a workflow acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Derivation index, forwarded to the signer.
    pub index: u32,
    /// Bech32 address body shared by the X/P chains (e.g. `avax1...`).
    pub xp_address: String,
    /// C-Chain EVM address.
    pub evm_address: Address,
}

impl Account {
    /// Address on the P-Chain (`P-avax1...`).
    pub fn p_address(&self) -> String {
        format!("P-{}", self.xp_address)
    }

    /// Bech32 address used for C-Chain atomic UTXOs (`C-avax1...`).
    pub fn c_atomic_address(&self) -> String {
        format!("C-{}", self.xp_address)
    }
}

/// Confirmed spendable balance of an account on one chain, in that chain's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainBalance {
    pub chain: Chain,
    pub amount: u128,
}

impl ChainBalance {
    pub fn new(chain: Chain, amount: u128) -> Self {
        Self { chain, amount }
    }

    /// Balance expressed in P-Chain nano units (C-Chain wei are floored).
    pub fn in_nano_units(&self) -> u64 {
        let nano = match self.chain {
            Chain::C => self.amount / WEI_PER_NANO,
            Chain::P => self.amount,
        };
        u64::try_from(nano).unwrap_or(u64::MAX)
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or transport failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC call {method} rejected ({code}): {message}")]
    RpcResponse {
        method: String,
        code: i64,
        message: String,
    },

    /// The node answered with a payload that does not match the expected shape.
    #[error("Malformed {method} response: {reason}")]
    Decode { method: String, reason: String },

    /// Invalid private key or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// The transaction builder could not produce an unsigned transaction.
    #[error("Transaction builder error: {0}")]
    Builder(String),

    /// Blockchain client not initialized or disabled.
    #[error("Blockchain not available: {0}")]
    NotAvailable(String),
}

impl Transient for BlockchainError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            BlockchainError::Rpc(_) | BlockchainError::Timeout(_) | BlockchainError::NotAvailable(_)
        )
    }
}

impl BlockchainError {
    /// The node refused a payload because it has already seen it.
    pub fn is_known_tx(&self) -> bool {
        match self {
            BlockchainError::RpcResponse { message, .. } => {
                let message = message.to_lowercase();
                ["duplicate", "already issued", "already known"]
                    .iter()
                    .any(|marker| message.contains(marker))
            }
            _ => false,
        }
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Status reported by the P-Chain `getTxStatus` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PChainTxStatus {
    Committed,
    Processing,
    Dropped,
    #[serde(other)]
    Unknown,
}

/// Response of the P-Chain `getTxStatus` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PChainTxStatusResponse {
    pub status: PChainTxStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Status reported by the C-Chain `getAtomicTxStatus` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AtomicTxStatus {
    Accepted,
    Processing,
    Dropped,
    #[serde(other)]
    Unknown,
}

/// Response of the C-Chain `getAtomicTxStatus` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicTxStatusResponse {
    pub status: AtomicTxStatus,
    #[serde(default)]
    pub block_height: Option<String>,
}

/// A status response from whichever chain the transaction was issued on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatusResponse {
    PChain(PChainTxStatusResponse),
    CChainAtomic(AtomicTxStatusResponse),
}

impl TxStatusResponse {
    /// Collapse the chain-specific status into the workflow's view.
    pub fn status(&self) -> TxStatus {
        match self {
            TxStatusResponse::PChain(r) => match r.status {
                PChainTxStatus::Committed => TxStatus::Committed,
                PChainTxStatus::Dropped => TxStatus::Failed,
                PChainTxStatus::Processing | PChainTxStatus::Unknown => TxStatus::Pending,
            },
            TxStatusResponse::CChainAtomic(r) => match r.status {
                AtomicTxStatus::Accepted => TxStatus::Committed,
                AtomicTxStatus::Dropped => TxStatus::Failed,
                AtomicTxStatus::Processing | AtomicTxStatus::Unknown => TxStatus::Pending,
            },
        }
    }

    /// Human readable reason attached to a dropped transaction, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            TxStatusResponse::PChain(r) => r.reason.as_deref(),
            TxStatusResponse::CChainAtomic(_) => None,
        }
    }
}

/// Workflow-level status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Pending,
    Committed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

/// Final state of one issued transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub tx_id: TxId,
    pub status: TxStatus,
}

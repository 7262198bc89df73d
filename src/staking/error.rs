//! Workflow error type.

use thiserror::Error;

use crate::blockchain::types::{BlockchainError, Chain, TxId};
use crate::resilience::Transient;
use crate::staking::types::Operation;

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any transaction was built; fix the request and retry.
    Validation,
    /// The signer refused or failed; never retried.
    Signing,
    /// The network was unreachable; retrying later is safe.
    Transient,
    /// A broadcast transaction never reached a terminal status in time.
    ConfirmationTimeout,
    /// The ledger dropped a transaction or refused it outright.
    Rejected,
}

/// Errors that abort a staking workflow.
#[derive(Debug, Error)]
pub enum StakingError {
    #[error("Insufficient balance on {chain}: need {needed}, have {available}")]
    InsufficientBalance {
        chain: Chain,
        needed: u64,
        available: u64,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("A fund movement is already in flight: {pending} nAVAX waiting in the {chain} import queue")]
    WorkflowInFlight { chain: Chain, pending: u64 },

    #[error("{operation} fee rose from {planned} to {current} nAVAX since planning")]
    FeeSpike {
        operation: Operation,
        planned: u64,
        current: u64,
    },

    #[error("Failed to build {operation} transaction: {source}")]
    Build {
        operation: Operation,
        #[source]
        source: BlockchainError,
    },

    #[error("Failed to sign {operation} transaction: {source}")]
    Signing {
        operation: Operation,
        #[source]
        source: BlockchainError,
    },

    #[error("Failed to broadcast {operation} transaction after {attempts} attempts: {source}")]
    Broadcast {
        operation: Operation,
        attempts: u32,
        #[source]
        source: BlockchainError,
    },

    #[error("{operation} failed. txId = {tx_id}: not committed after {attempts} status checks")]
    ConfirmationTimeout {
        operation: Operation,
        tx_id: TxId,
        attempts: u32,
    },

    #[error("{operation} failed. txId = {tx_id}: {reason}")]
    TxRejected {
        operation: Operation,
        tx_id: TxId,
        reason: String,
    },

    #[error("{operation} status check for txId = {tx_id} failed: {source}")]
    StatusCheck {
        operation: Operation,
        tx_id: TxId,
        #[source]
        source: BlockchainError,
    },

    #[error(
        "{operation} needs {needed} nAVAX on {chain}, still {available} after {attempts} balance checks (committed: {})",
        join_tx_ids(.committed)
    )]
    BalanceNotSettled {
        operation: Operation,
        chain: Chain,
        needed: u64,
        available: u64,
        attempts: u32,
        /// Transactions of earlier steps in the same run.
        committed: Vec<TxId>,
    },

    #[error(transparent)]
    Rpc(#[from] BlockchainError),

    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    #[error("No validator satisfies the selection criteria")]
    NoEligibleValidator,
}

impl StakingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StakingError::InsufficientBalance { .. }
            | StakingError::InvalidRequest(_)
            | StakingError::WorkflowInFlight { .. }
            | StakingError::FeeSpike { .. }
            | StakingError::ArithmeticOverflow(_)
            | StakingError::NoEligibleValidator => ErrorKind::Validation,
            StakingError::Signing { .. } => ErrorKind::Signing,
            StakingError::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            StakingError::TxRejected { .. } => ErrorKind::Rejected,
            StakingError::BalanceNotSettled { .. } => ErrorKind::Transient,
            StakingError::Build { source, .. }
            | StakingError::Broadcast { source, .. }
            | StakingError::StatusCheck { source, .. }
            | StakingError::Rpc(source) => {
                if source.is_transient() {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Rejected
                }
            }
        }
    }

    /// Transaction the error refers to, when one was already broadcast.
    pub fn tx_id(&self) -> Option<&TxId> {
        match self {
            StakingError::ConfirmationTimeout { tx_id, .. }
            | StakingError::TxRejected { tx_id, .. }
            | StakingError::StatusCheck { tx_id, .. } => Some(tx_id),
            _ => None,
        }
    }

    /// Step the error refers to, if it happened while executing one.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            StakingError::FeeSpike { operation, .. }
            | StakingError::Build { operation, .. }
            | StakingError::Signing { operation, .. }
            | StakingError::Broadcast { operation, .. }
            | StakingError::ConfirmationTimeout { operation, .. }
            | StakingError::TxRejected { operation, .. }
            | StakingError::StatusCheck { operation, .. }
            | StakingError::BalanceNotSettled { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

fn join_tx_ids(ids: &[TxId]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter().map(TxId::as_str).collect::<Vec<_>>().join(", ")
}

/// Result type for staking operations.
pub type StakingResult<T> = Result<T, StakingError>;

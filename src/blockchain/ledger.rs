//! Ledger collaborators consumed by the staking workflow.
//!
//! Everything the orchestrator knows about chain state comes through these
//! two traits, and is re-read before every decision that spends funds.

use async_trait::async_trait;

use crate::blockchain::transaction::SignedTx;
use crate::blockchain::types::{
    Account, AtomicTxStatusResponse, BlockchainResult, Chain, ChainBalance, Network,
    PChainTxStatusResponse, TxId, TxStatusResponse,
};
use crate::blockchain::utxo::AtomicUtxos;
use crate::staking::types::Validator;

/// Network/RPC access to both chains.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Submit a signed transaction on the chain it was built for.
    ///
    /// Only guarantees the node received it; acceptance is observed by polling.
    async fn send_transaction(&self, tx: &SignedTx, network: Network) -> BlockchainResult<TxId>;

    /// Status of a P-Chain transaction.
    async fn get_tx_status(&self, tx_id: &TxId) -> BlockchainResult<PChainTxStatusResponse>;

    /// Status of a C-Chain atomic (import/export) transaction.
    async fn get_atomic_tx_status(&self, tx_id: &TxId) -> BlockchainResult<AtomicTxStatusResponse>;

    /// Current C-Chain base fee in wei per gas.
    async fn get_base_fee(&self) -> BlockchainResult<u128>;

    /// Upper bound of the token supply, in nano units.
    async fn get_current_supply(&self) -> BlockchainResult<u64>;

    /// Snapshot of the primary network's current validators.
    async fn get_current_validators(&self) -> BlockchainResult<Vec<Validator>>;

    /// Confirmed spendable balance of `account` on `chain`.
    async fn get_balance(&self, chain: Chain, account: &Account) -> BlockchainResult<ChainBalance>;

    /// Status of a transaction through the API of the chain it was issued on.
    async fn get_status_on(&self, chain: Chain, tx_id: &TxId) -> BlockchainResult<TxStatusResponse> {
        match chain {
            Chain::P => Ok(TxStatusResponse::PChain(self.get_tx_status(tx_id).await?)),
            Chain::C => Ok(TxStatusResponse::CChainAtomic(
                self.get_atomic_tx_status(tx_id).await?,
            )),
        }
    }
}

/// Atomic UTXO queries.
#[async_trait]
pub trait UtxoSource: Send + Sync {
    /// Pending atomic UTXOs of `account` on both import queues.
    async fn get_atomic_utxos(
        &self,
        account: &Account,
        network: Network,
    ) -> BlockchainResult<AtomicUtxos>;
}

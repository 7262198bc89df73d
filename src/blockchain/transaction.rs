//! Unsigned and signed transaction envelopes, and the builder collaborator.
//!
//! Building the chain-specific transaction bytes is the wallet SDK's job; the
//! orchestrator only decides *which* transaction to build and with which
//! parameters, then carries the opaque bytes through signing and broadcast.

use alloy::primitives::{keccak256, B256};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::blockchain::types::{Account, BlockchainResult, Chain, TxId};

const CB58_CHECKSUM_LEN: usize = 4;

/// A transaction ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx {
    /// Chain the transaction is issued on.
    pub chain: Chain,
    /// Serialized unsigned transaction.
    pub bytes: Vec<u8>,
    /// Fee the transaction burns, in nano units.
    pub burned_fee: u64,
}

impl UnsignedTx {
    /// Digest the signer commits to.
    pub fn signing_hash(&self) -> B256 {
        keccak256(&self.bytes)
    }
}

/// A signed transaction. Re-broadcasting the same payload is idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub chain: Chain,
    pub bytes: Vec<u8>,
}

impl SignedTx {
    /// Hex encoding accepted by the node's `issueTx` calls.
    pub fn to_hex(&self) -> String {
        alloy::hex::encode_prefixed(&self.bytes)
    }

    /// Id the ledger assigns to this payload: CB58 of the SHA-256 of the signed bytes.
    pub fn tx_id(&self) -> TxId {
        let digest = Sha256::digest(&self.bytes);
        let checksum = Sha256::digest(digest);

        let mut payload = digest.to_vec();
        payload.extend_from_slice(&checksum[checksum.len() - CB58_CHECKSUM_LEN..]);
        TxId(bs58::encode(payload).into_string())
    }
}

/// Parameters of an export from `source` into the atomic memory of `destination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportParams {
    pub account: Account,
    pub source: Chain,
    pub destination: Chain,
    /// Amount to move, in nano units.
    pub amount: u64,
    /// C-Chain base fee in nano units per gas, for C-Chain exports.
    pub base_fee: Option<u64>,
}

/// Parameters of an import of every pending atomic UTXO from `source` into `destination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportParams {
    pub account: Account,
    pub source: Chain,
    pub destination: Chain,
    /// C-Chain base fee in nano units per gas, for C-Chain imports.
    pub base_fee: Option<u64>,
}

/// Parameters of a delegation to an existing validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatorParams {
    pub account: Account,
    pub node_id: String,
    /// Stake amount, in nano units.
    pub amount: u64,
    /// Unix seconds.
    pub start_time: u64,
    /// Unix seconds.
    pub end_time: u64,
    pub reward_address: String,
}

/// Produces unsigned transactions from structured parameters.
#[async_trait]
pub trait TxFactory: Send + Sync {
    async fn create_export_tx(&self, params: &ExportParams) -> BlockchainResult<UnsignedTx>;

    async fn create_import_tx(&self, params: &ImportParams) -> BlockchainResult<UnsignedTx>;

    async fn create_delegator_tx(&self, params: &DelegatorParams) -> BlockchainResult<UnsignedTx>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_hash_is_content_hash() {
        let a = UnsignedTx {
            chain: Chain::P,
            bytes: vec![1, 2, 3],
            burned_fee: 0,
        };
        let b = UnsignedTx {
            burned_fee: 99,
            ..a.clone()
        };
        assert_eq!(a.signing_hash(), b.signing_hash());
        assert_ne!(
            a.signing_hash(),
            UnsignedTx {
                bytes: vec![3, 2, 1],
                ..a
            }
            .signing_hash()
        );
    }

    #[test]
    fn test_signed_hex() {
        let tx = SignedTx {
            chain: Chain::C,
            bytes: vec![0xab, 0xcd],
        };
        assert_eq!(tx.to_hex(), "0xabcd");
    }

    #[test]
    fn test_tx_id_is_cb58_content_hash() {
        let tx = SignedTx {
            chain: Chain::P,
            bytes: vec![1, 2, 3],
        };
        assert_eq!(
            tx.tx_id().as_str(),
            "2a2xz3zWjg7iZeqbqJFtjhpBjVeBDY6UQKS9zHJ7Bnz9PNPoj"
        );
        assert_eq!(tx.tx_id(), SignedTx { chain: Chain::C, ..tx.clone() }.tx_id());
        assert_ne!(tx.tx_id(), SignedTx { bytes: vec![3, 2, 1], ..tx }.tx_id());
    }
}

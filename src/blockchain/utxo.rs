//! Atomic UTXO sets and their wire decoding.
//!
//! A UTXO sitting in a chain's shared-memory import queue is the on-chain
//! trace of a fund movement whose export committed but whose import did not.

use alloy::primitives::B256;

use crate::blockchain::types::{BlockchainError, BlockchainResult, Chain};

const CODEC_VERSION_LEN: usize = 2;
const ID_LEN: usize = 32;
const TRANSFER_OUTPUT_TYPE_ID: u32 = 7;
const CHECKSUM_LEN: usize = 4;
const MIN_UTXO_LEN: usize = CODEC_VERSION_LEN + ID_LEN + 4 + ID_LEN + 4 + 8;

/// A single unspent transfer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub tx_id: B256,
    pub output_index: u32,
    pub asset_id: B256,
    pub amount: u64,
}

impl Utxo {
    /// Decode a UTXO from the node's `hex` encoding (`0x` + bytes + 4-byte checksum).
    pub fn from_hex(encoded: &str) -> BlockchainResult<Self> {
        let bytes = alloy::hex::decode(encoded).map_err(|e| decode_error(format!("bad hex: {}", e)))?;
        if bytes.len() < MIN_UTXO_LEN + CHECKSUM_LEN {
            return Err(decode_error(format!("UTXO too short ({} bytes)", bytes.len())));
        }
        Self::from_bytes(&bytes[..bytes.len() - CHECKSUM_LEN])
    }

    fn from_bytes(bytes: &[u8]) -> BlockchainResult<Self> {
        let mut offset = CODEC_VERSION_LEN;

        let tx_id = B256::from_slice(&bytes[offset..offset + ID_LEN]);
        offset += ID_LEN;
        let output_index = read_u32(bytes, offset);
        offset += 4;
        let asset_id = B256::from_slice(&bytes[offset..offset + ID_LEN]);
        offset += ID_LEN;
        let type_id = read_u32(bytes, offset);
        offset += 4;

        if type_id != TRANSFER_OUTPUT_TYPE_ID {
            return Err(decode_error(format!("unsupported output type {}", type_id)));
        }

        let mut amount_bytes = [0u8; 8];
        amount_bytes.copy_from_slice(&bytes[offset..offset + 8]);

        Ok(Self {
            tx_id,
            output_index,
            asset_id,
            amount: u64::from_be_bytes(amount_bytes),
        })
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_be_bytes(buf)
}

fn decode_error(reason: String) -> BlockchainError {
    BlockchainError::Decode {
        method: "getUTXOs".to_string(),
        reason,
    }
}

/// UTXOs waiting in one chain's import queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    utxos: Vec<Utxo>,
}

impl UtxoSet {
    pub fn new(utxos: Vec<Utxo>) -> Self {
        Self { utxos }
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn utxos(&self) -> &[Utxo] {
        &self.utxos
    }

    /// Sum of all output amounts in nano units.
    pub fn total_amount(&self) -> u64 {
        self.utxos
            .iter()
            .fold(0u64, |acc, utxo| acc.saturating_add(utxo.amount))
    }
}

/// Pending atomic UTXOs of an account on both import queues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicUtxos {
    /// Exported from the C-Chain, waiting to be imported on the P-Chain.
    pub p_chain: UtxoSet,
    /// Exported from the P-Chain, waiting to be imported on the C-Chain.
    pub c_chain: UtxoSet,
}

impl AtomicUtxos {
    /// Import queue on the given destination chain.
    pub fn queue(&self, chain: Chain) -> &UtxoSet {
        match chain {
            Chain::P => &self.p_chain,
            Chain::C => &self.c_chain,
        }
    }

    /// True when no fund movement is half-finished.
    pub fn is_empty(&self) -> bool {
        self.p_chain.is_empty() && self.c_chain.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn encode_test_utxo(output_index: u32, amount: u64, type_id: u32) -> String {
    let mut bytes = vec![0u8, 0u8];
    bytes.extend_from_slice(&[0x11; 32]);
    bytes.extend_from_slice(&output_index.to_be_bytes());
    bytes.extend_from_slice(&[0x22; 32]);
    bytes.extend_from_slice(&type_id.to_be_bytes());
    bytes.extend_from_slice(&amount.to_be_bytes());
    bytes.extend_from_slice(&0u64.to_be_bytes()); // locktime
    bytes.extend_from_slice(&1u32.to_be_bytes()); // threshold
    bytes.extend_from_slice(&1u32.to_be_bytes()); // address count
    bytes.extend_from_slice(&[0x33; 20]);
    bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]); // checksum
    alloy::hex::encode_prefixed(bytes)
}

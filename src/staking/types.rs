//! Staking domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::blockchain::types::Chain;

/// A request to delegate stake to one validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRequest {
    /// Stake in nano units.
    pub amount_to_stake: u64,
    pub duration_seconds: u64,
    /// Validator's delegation fee, in percent.
    pub delegation_fee_percent: Decimal,
    pub node_id: String,
    /// Unix seconds.
    pub start_time: u64,
    /// Unix seconds.
    pub end_time: u64,
}

/// One on-chain operation of a fund-movement workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Export from the C-Chain into the P-Chain import queue.
    ExportC,
    /// Import pending UTXOs into the P-Chain.
    ImportP,
    /// Delegate stake to a validator.
    Delegate,
    /// Export from the P-Chain into the C-Chain import queue.
    ExportP,
    /// Import pending UTXOs into the C-Chain.
    ImportC,
}

impl Operation {
    /// Chain the operation's transaction is issued on.
    pub fn chain(&self) -> Chain {
        match self {
            Operation::ExportC | Operation::ImportC => Chain::C,
            Operation::ImportP | Operation::Delegate | Operation::ExportP => Chain::P,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ExportC => "EXPORT_C",
            Operation::ImportP => "IMPORT_P",
            Operation::Delegate => "DELEGATE",
            Operation::ExportP => "EXPORT_P",
            Operation::ImportC => "IMPORT_C",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A planned operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub operation: Operation,
    /// Amount moved or staked, in nano units. Imports carry the expected import amount.
    pub amount: u64,
    /// Fee estimate in nano units.
    pub estimated_fee: u64,
}

/// Snapshot of a validator on the primary network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub node_id: String,
    /// Unix seconds.
    pub start_time: u64,
    /// Unix seconds.
    pub end_time: u64,
    /// Validator's own stake, in nano units.
    pub stake_amount: u64,
    /// Stake already delegated to this validator, in nano units.
    pub delegator_weight: u64,
    pub uptime_percent: Decimal,
    pub delegation_fee_percent: Decimal,
    pub connected: bool,
}

impl Validator {
    /// Remaining validation time after `now`, in seconds.
    pub fn remaining_seconds(&self, now: u64) -> u64 {
        self.end_time.saturating_sub(now)
    }
}

//! Per-operation fee estimates.

use async_trait::async_trait;
use std::sync::Arc;

use crate::blockchain::ledger::LedgerRpc;
use crate::blockchain::types::{Account, BlockchainResult, WEI_PER_NANO};
use crate::config::schema::FeeConfig;
use crate::staking::types::Operation;

/// Estimates what each operation will burn.
#[async_trait]
pub trait FeeOracle: Send + Sync {
    /// Fee of `operation` for `account`, in nano units.
    async fn estimate_fee(&self, account: &Account, operation: Operation) -> BlockchainResult<u64>;

    /// C-Chain base fee to build atomic C-Chain transactions with, in nano units per gas.
    async fn c_chain_base_fee(&self) -> BlockchainResult<u64>;
}

/// Fee oracle backed by the live C-Chain base fee and configured P-Chain fees.
pub struct LedgerFeeOracle {
    ledger: Arc<dyn LedgerRpc>,
    config: FeeConfig,
}

impl LedgerFeeOracle {
    pub fn new(ledger: Arc<dyn LedgerRpc>, config: FeeConfig) -> Self {
        Self { ledger, config }
    }

    fn p_chain_fee(&self, base: u64) -> u64 {
        apply_multiplier(base, self.config.p_fee_multiplier)
    }
}

/// `value * multiplier`, rounded up.
fn apply_multiplier(value: u64, multiplier: f64) -> u64 {
    let scaled = (value as f64 * multiplier).ceil();
    if scaled >= u64::MAX as f64 {
        u64::MAX
    } else {
        scaled as u64
    }
}

#[async_trait]
impl FeeOracle for LedgerFeeOracle {
    async fn estimate_fee(&self, _account: &Account, operation: Operation) -> BlockchainResult<u64> {
        let fee = match operation {
            Operation::ExportC => self
                .c_chain_base_fee()
                .await?
                .saturating_mul(self.config.export_c_gas),
            Operation::ImportC => self
                .c_chain_base_fee()
                .await?
                .saturating_mul(self.config.import_c_gas),
            Operation::ImportP => self.p_chain_fee(self.config.import_p_fee),
            Operation::ExportP => self.p_chain_fee(self.config.export_p_fee),
            Operation::Delegate => self.p_chain_fee(self.config.delegate_fee),
        };
        tracing::debug!(operation = %operation, fee, "Fee estimated");
        Ok(fee)
    }

    async fn c_chain_base_fee(&self) -> BlockchainResult<u64> {
        let wei_per_gas = self.ledger.get_base_fee().await?;
        let nano_per_gas = u64::try_from(wei_per_gas.div_ceil(WEI_PER_NANO)).unwrap_or(u64::MAX);
        Ok(apply_multiplier(nano_per_gas, self.config.c_base_fee_multiplier))
    }
}

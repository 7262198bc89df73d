//! Fund-movement step planning.
//!
//! # Responsibilities
//! - Turn fresh balances and a target stake into an ordered step list
//! - Attach a fee estimate to every step
//! - Refuse to start a new export while another movement is in flight
//!
//! # Data Flow
//! ```text
//! balances (P, C, import queues) + stake amount
//!     → compute_steps
//!         → [DELEGATE]                          P already covers stake + fee
//!         → [IMPORT_P, DELEGATE]                pending P import covers the rest
//!         → [EXPORT_C, IMPORT_P, DELEGATE]      otherwise
//!     → validate_steps (simulated balances never go negative)
//! ```

use std::sync::Arc;

use crate::blockchain::types::{Account, Chain};
use crate::staking::error::{StakingError, StakingResult};
use crate::staking::fees::FeeOracle;
use crate::staking::types::{Operation, Step};

/// Balances read right before planning, all in nano units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanningBalances {
    /// Spendable P-Chain balance.
    pub p_chain: u64,
    /// Spendable C-Chain balance.
    pub c_chain: u64,
    /// Exported to the P-Chain, not yet imported.
    pub pending_p_import: u64,
    /// Exported to the C-Chain, not yet imported.
    pub pending_c_import: u64,
}

/// Computes step sequences from balances and fee estimates.
pub struct StepPlanner {
    fees: Arc<dyn FeeOracle>,
}

impl StepPlanner {
    pub fn new(fees: Arc<dyn FeeOracle>) -> Self {
        Self { fees }
    }

    async fn fee(&self, account: &Account, operation: Operation) -> StakingResult<u64> {
        Ok(self.fees.estimate_fee(account, operation).await?)
    }

    /// Steps that bring `required_stake` nano units onto the P-Chain and delegate them.
    pub async fn compute_steps(
        &self,
        account: &Account,
        balances: &PlanningBalances,
        required_stake: u64,
    ) -> StakingResult<Vec<Step>> {
        if required_stake == 0 {
            return Err(StakingError::InvalidRequest(
                "stake amount must be greater than zero".to_string(),
            ));
        }

        let delegate_fee = self.fee(account, Operation::Delegate).await?;
        let delegate = Step {
            operation: Operation::Delegate,
            amount: required_stake,
            estimated_fee: delegate_fee,
        };
        let needed_on_p = required_stake
            .checked_add(delegate_fee)
            .ok_or(StakingError::ArithmeticOverflow("step planning"))?;

        if balances.p_chain >= needed_on_p {
            return self.finish(vec![delegate], balances);
        }

        let import_fee = self.fee(account, Operation::ImportP).await?;

        if balances.pending_p_import > 0 {
            let after_import = (balances.p_chain as u128 + balances.pending_p_import as u128)
                .saturating_sub(import_fee as u128);
            if after_import >= needed_on_p as u128 {
                tracing::info!(
                    pending = balances.pending_p_import,
                    "Resuming with pending P-Chain import"
                );
                let import = Step {
                    operation: Operation::ImportP,
                    amount: balances.pending_p_import,
                    estimated_fee: import_fee,
                };
                return self.finish(vec![import, delegate], balances);
            }
            return Err(StakingError::WorkflowInFlight {
                chain: Chain::P,
                pending: balances.pending_p_import,
            });
        }
        if balances.pending_c_import > 0 {
            return Err(StakingError::WorkflowInFlight {
                chain: Chain::C,
                pending: balances.pending_c_import,
            });
        }

        let shortfall = needed_on_p - balances.p_chain;
        let export_amount = shortfall
            .checked_add(import_fee)
            .ok_or(StakingError::ArithmeticOverflow("step planning"))?;
        let export_fee = self.fee(account, Operation::ExportC).await?;

        let needed_on_c = export_amount.saturating_add(export_fee);
        if balances.c_chain < needed_on_c {
            return Err(StakingError::InsufficientBalance {
                chain: Chain::C,
                needed: needed_on_c,
                available: balances.c_chain,
            });
        }

        let steps = vec![
            Step {
                operation: Operation::ExportC,
                amount: export_amount,
                estimated_fee: export_fee,
            },
            Step {
                operation: Operation::ImportP,
                amount: export_amount,
                estimated_fee: import_fee,
            },
            delegate,
        ];
        self.finish(steps, balances)
    }

    /// Steps that move `amount` nano units from the P-Chain back to the C-Chain.
    pub async fn compute_claim_steps(
        &self,
        account: &Account,
        balances: &PlanningBalances,
        amount: u64,
    ) -> StakingResult<Vec<Step>> {
        if amount == 0 {
            return Err(StakingError::InvalidRequest(
                "claim amount must be greater than zero".to_string(),
            ));
        }
        if balances.pending_c_import > 0 {
            return Err(StakingError::WorkflowInFlight {
                chain: Chain::C,
                pending: balances.pending_c_import,
            });
        }

        let export_fee = self.fee(account, Operation::ExportP).await?;
        let import_fee = self.fee(account, Operation::ImportC).await?;
        if amount <= import_fee {
            return Err(StakingError::InvalidRequest(format!(
                "claim amount {} does not cover the {} nAVAX import fee",
                amount, import_fee
            )));
        }

        let steps = vec![
            Step {
                operation: Operation::ExportP,
                amount,
                estimated_fee: export_fee,
            },
            Step {
                operation: Operation::ImportC,
                amount,
                estimated_fee: import_fee,
            },
        ];
        self.finish(steps, balances)
    }

    fn finish(&self, steps: Vec<Step>, balances: &PlanningBalances) -> StakingResult<Vec<Step>> {
        validate_steps(&steps, balances)?;
        tracing::debug!(
            steps = ?steps.iter().map(|s| s.operation.as_str()).collect::<Vec<_>>(),
            "Steps planned"
        );
        Ok(steps)
    }
}

fn debit(chain: Chain, balance: &mut u64, needed: u64) -> StakingResult<()> {
    if *balance < needed {
        return Err(StakingError::InsufficientBalance {
            chain,
            needed,
            available: *balance,
        });
    }
    *balance -= needed;
    Ok(())
}

/// Replay `steps` against `balances`, failing if any balance or queue would go negative.
///
/// An import can only consume what an earlier export (or a pending queue) put there,
/// so out-of-order sequences fail here too.
pub fn validate_steps(steps: &[Step], balances: &PlanningBalances) -> StakingResult<()> {
    let mut p = balances.p_chain;
    let mut c = balances.c_chain;
    let mut p_queue = balances.pending_p_import;
    let mut c_queue = balances.pending_c_import;

    for step in steps {
        let with_fee = step.amount.saturating_add(step.estimated_fee);
        match step.operation {
            Operation::ExportC => {
                debit(Chain::C, &mut c, with_fee)?;
                p_queue = p_queue.saturating_add(step.amount);
            }
            Operation::ExportP => {
                debit(Chain::P, &mut p, with_fee)?;
                c_queue = c_queue.saturating_add(step.amount);
            }
            Operation::ImportP => {
                debit(Chain::P, &mut p_queue, step.amount)?;
                p = p.saturating_add(step.amount.saturating_sub(step.estimated_fee));
            }
            Operation::ImportC => {
                debit(Chain::C, &mut c_queue, step.amount)?;
                c = c.saturating_add(step.amount.saturating_sub(step.estimated_fee));
            }
            Operation::Delegate => debit(Chain::P, &mut p, with_fee)?,
        }
    }
    Ok(())
}

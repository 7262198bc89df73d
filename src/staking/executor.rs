//! Transaction lifecycle: build, sign, broadcast, confirm.
//!
//! # Responsibilities
//! - Drive each step through `BUILT → SIGNED → BROADCAST → CONFIRMING → COMMITTED | FAILED`
//! - Retry broadcasts on transient errors, always with the same signed payload
//! - Poll the issuing chain's status API until a terminal status or budget exhaustion
//! - Run a step list strictly in order, each confirmed before the next starts
//!
//! # Design Decisions
//! - Signing failures are final; nothing is retried around the signer
//! - Nothing is cancelled once a transaction is broadcast
//! - Balances and fees are re-read right before they are spent
//! - An export is built with the same base fee its fee check saw
//! - A resend the node rejects as already known resolves to the payload's own id

use std::sync::Arc;
use std::time::Instant;

use crate::blockchain::ledger::LedgerRpc;
use crate::blockchain::transaction::{
    DelegatorParams, ExportParams, ImportParams, SignedTx, TxFactory, UnsignedTx,
};
use crate::blockchain::types::{
    Account, BlockchainError, Chain, Network, TransactionOutcome, TxId, TxStatus,
};
use crate::blockchain::wallet::TxSigner;
use crate::config::schema::{FeeConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::{retry, RetryError};
use crate::staking::error::{StakingError, StakingResult};
use crate::staking::fees::FeeOracle;
use crate::staking::types::{Operation, StakeRequest, Step};

/// Lifecycle state of one step's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Built,
    Signed,
    Broadcast,
    Confirming,
    Committed,
    Failed,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Committed | StepState::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(&self, next: StepState) -> bool {
        use StepState::*;
        match (self, next) {
            (Built, Signed) | (Signed, Broadcast) | (Broadcast, Confirming) => true,
            (Confirming, Committed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Tracks and logs the state of a single step.
#[derive(Debug)]
struct StepTracker {
    operation: Operation,
    state: StepState,
}

impl StepTracker {
    fn new(operation: Operation) -> Self {
        tracing::debug!(operation = %operation, state = ?StepState::Built, "Step state");
        Self {
            operation,
            state: StepState::Built,
        }
    }

    fn advance(&mut self, next: StepState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal step transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(operation = %self.operation, from = ?self.state, to = ?next, "Step state");
        self.state = next;
    }

    fn fail(&mut self, error: StakingError) -> StakingError {
        self.advance(StepState::Failed);
        metrics::record_step_outcome(self.operation.as_str(), "failed");
        error
    }
}

/// A step together with the transaction that completed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: Step,
    pub outcome: TransactionOutcome,
}

/// Executes planned steps against the ledger.
pub struct TransactionExecutor {
    ledger: Arc<dyn LedgerRpc>,
    factory: Arc<dyn TxFactory>,
    signer: Arc<dyn TxSigner>,
    fees: Arc<dyn FeeOracle>,
    network: Network,
    retries: RetryConfig,
    fee_config: FeeConfig,
}

impl TransactionExecutor {
    pub fn new(
        ledger: Arc<dyn LedgerRpc>,
        factory: Arc<dyn TxFactory>,
        signer: Arc<dyn TxSigner>,
        fees: Arc<dyn FeeOracle>,
        network: Network,
        retries: RetryConfig,
        fee_config: FeeConfig,
    ) -> Self {
        Self {
            ledger,
            factory,
            signer,
            fees,
            network,
            retries,
            fee_config,
        }
    }

    /// Execute `steps` in order. Stops at the first failed step.
    pub async fn run(
        &self,
        account: &Account,
        steps: &[Step],
        request: Option<&StakeRequest>,
    ) -> StakingResult<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            tracing::info!(
                step = i + 1,
                total = steps.len(),
                operation = %step.operation,
                amount = step.amount,
                "Executing step"
            );
            let outcome = self
                .execute_step(account, step, request)
                .await
                .map_err(|e| with_committed(e, &reports))?;
            reports.push(StepReport {
                step: *step,
                outcome,
            });
        }
        Ok(reports)
    }

    /// Build, sign, broadcast, and confirm one step.
    pub async fn execute_step(
        &self,
        account: &Account,
        step: &Step,
        request: Option<&StakeRequest>,
    ) -> StakingResult<TransactionOutcome> {
        let c_base_fee = match step.operation {
            Operation::ExportC => Some(self.export_base_fee(step).await?),
            Operation::ImportC => Some(self.fees.c_chain_base_fee().await?),
            Operation::Delegate => {
                self.wait_for_p_balance(account, step).await?;
                None
            }
            Operation::ImportP | Operation::ExportP => None,
        };

        let unsigned = self.build(account, step, request, c_base_fee).await?;
        let mut tracker = StepTracker::new(step.operation);

        let signed = self
            .signer
            .sign(&unsigned, account.index, self.network)
            .await
            .map_err(|source| {
                tracker.fail(StakingError::Signing {
                    operation: step.operation,
                    source,
                })
            })?;
        tracker.advance(StepState::Signed);

        let tx_id = self
            .broadcast(step.operation, &signed)
            .await
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(StepState::Broadcast);
        tracing::info!(operation = %step.operation, tx_id = %tx_id, "Transaction broadcast");

        tracker.advance(StepState::Confirming);
        let started = Instant::now();
        let result = self.confirm(step.operation, &tx_id).await;
        metrics::record_confirmation_latency(step.operation.as_str(), started);
        result.map_err(|e| tracker.fail(e))?;

        tracker.advance(StepState::Committed);
        metrics::record_step_outcome(step.operation.as_str(), "committed");
        tracing::info!(operation = %step.operation, tx_id = %tx_id, "Transaction committed");

        Ok(TransactionOutcome {
            tx_id,
            status: TxStatus::Committed,
        })
    }

    /// Base fee the export is built with, read once.
    ///
    /// With re-fetching on, an export whose fee at this base fee exceeds the
    /// planned estimate is aborted.
    async fn export_base_fee(&self, step: &Step) -> StakingResult<u64> {
        let base_fee = self.fees.c_chain_base_fee().await?;
        if !self.fee_config.refetch_before_broadcast {
            return Ok(base_fee);
        }

        let current = base_fee.saturating_mul(self.fee_config.export_c_gas);
        if current > step.estimated_fee {
            tracing::warn!(
                operation = %step.operation,
                planned = step.estimated_fee,
                current,
                "Fee rose since planning"
            );
            return Err(StakingError::FeeSpike {
                operation: step.operation,
                planned: step.estimated_fee,
                current,
            });
        }
        Ok(base_fee)
    }

    /// Wait until the P-Chain balance covers the delegation.
    ///
    /// An accepted import becomes spendable only after the P-Chain state catches up.
    async fn wait_for_p_balance(&self, account: &Account, step: &Step) -> StakingResult<()> {
        let needed = step.amount.saturating_add(step.estimated_fee);
        let ledger = &self.ledger;
        let policy = self.retries.balance_check_policy();

        let result = retry(
            &policy,
            move |attempt| {
                if attempt > 0 {
                    metrics::record_retry("balance_check");
                }
                ledger.get_balance(Chain::P, account)
            },
            |balance| balance.in_nano_units() >= needed,
        )
        .await;

        let not_settled = |attempts: u32, available: u64| StakingError::BalanceNotSettled {
            operation: step.operation,
            chain: Chain::P,
            needed,
            available,
            attempts,
            committed: Vec::new(),
        };

        match result {
            Ok(_) => Ok(()),
            Err(RetryError::Exhausted {
                attempts,
                last_value: Some(balance),
                ..
            }) => Err(not_settled(attempts, balance.in_nano_units())),
            Err(e) => {
                let attempts = e.attempts();
                match e.into_error() {
                    Some(source) => Err(StakingError::Rpc(source)),
                    None => Err(not_settled(attempts, 0)),
                }
            }
        }
    }

    async fn build(
        &self,
        account: &Account,
        step: &Step,
        request: Option<&StakeRequest>,
        c_base_fee: Option<u64>,
    ) -> StakingResult<UnsignedTx> {
        let operation = step.operation;
        let build_error = |source: BlockchainError| StakingError::Build { operation, source };

        let unsigned = match operation {
            Operation::ExportC | Operation::ExportP => {
                let source = operation.chain();
                self.factory
                    .create_export_tx(&ExportParams {
                        account: account.clone(),
                        source,
                        destination: source.counterpart(),
                        amount: step.amount,
                        base_fee: c_base_fee,
                    })
                    .await
                    .map_err(build_error)?
            }
            Operation::ImportP | Operation::ImportC => {
                let destination = operation.chain();
                self.factory
                    .create_import_tx(&ImportParams {
                        account: account.clone(),
                        source: destination.counterpart(),
                        destination,
                        base_fee: c_base_fee,
                    })
                    .await
                    .map_err(build_error)?
            }
            Operation::Delegate => {
                let request = request.ok_or_else(|| {
                    StakingError::InvalidRequest("delegation step without a stake request".to_string())
                })?;
                self.factory
                    .create_delegator_tx(&DelegatorParams {
                        account: account.clone(),
                        node_id: request.node_id.clone(),
                        amount: step.amount,
                        start_time: request.start_time,
                        end_time: request.end_time,
                        reward_address: account.p_address(),
                    })
                    .await
                    .map_err(build_error)?
            }
        };

        if unsigned.chain != operation.chain() {
            return Err(build_error(BlockchainError::Builder(
                format!("{} built for {}, expected {}", operation, unsigned.chain, operation.chain()),
            )));
        }
        Ok(unsigned)
    }

    async fn broadcast(&self, operation: Operation, signed: &SignedTx) -> StakingResult<TxId> {
        let ledger = &self.ledger;
        let network = self.network;
        let policy = self.retries.broadcast_policy();

        retry(
            &policy,
            move |attempt| async move {
                if attempt > 0 {
                    metrics::record_retry("broadcast");
                }
                match ledger.send_transaction(signed, network).await {
                    // An earlier attempt reached the node even though its reply was lost.
                    Err(e) if e.is_known_tx() => {
                        let tx_id = signed.tx_id();
                        tracing::warn!(
                            operation = %operation,
                            tx_id = %tx_id,
                            attempt,
                            "Node already has this transaction"
                        );
                        Ok(tx_id)
                    }
                    result => result,
                }
            },
            |_| true,
        )
        .await
        .map_err(|e| {
            let attempts = e.attempts();
            match e.into_error() {
                Some(source) => StakingError::Broadcast {
                    operation,
                    attempts,
                    source,
                },
                None => StakingError::InvalidRequest(format!("{} broadcast made no attempt", operation)),
            }
        })
    }

    async fn confirm(&self, operation: Operation, tx_id: &TxId) -> StakingResult<()> {
        let ledger = &self.ledger;
        let chain = operation.chain();
        let policy = self.retries.status_check_policy();

        let result = retry(
            &policy,
            move |attempt| {
                if attempt > 0 {
                    metrics::record_retry("status_check");
                }
                ledger.get_status_on(chain, tx_id)
            },
            |response| response.status().is_terminal(),
        )
        .await;

        match result {
            Ok(response) if response.status() == TxStatus::Committed => Ok(()),
            Ok(response) => Err(StakingError::TxRejected {
                operation,
                tx_id: tx_id.clone(),
                reason: response.reason().unwrap_or("dropped by the ledger").to_string(),
            }),
            Err(RetryError::Exhausted { attempts, .. }) => {
                tracing::error!(
                    operation = %operation,
                    tx_id = %tx_id,
                    attempts,
                    "Transaction not committed within the status check budget"
                );
                Err(StakingError::ConfirmationTimeout {
                    operation,
                    tx_id: tx_id.clone(),
                    attempts,
                })
            }
            Err(RetryError::Aborted { error, .. }) => Err(StakingError::StatusCheck {
                operation,
                tx_id: tx_id.clone(),
                source: error,
            }),
        }
    }
}

/// Attach the transactions of already committed steps to an error raised mid-run.
fn with_committed(mut error: StakingError, reports: &[StepReport]) -> StakingError {
    if let StakingError::BalanceNotSettled { committed, .. } = &mut error {
        *committed = reports.iter().map(|r| r.outcome.tx_id.clone()).collect();
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use StepState::*;
        assert!(Built.can_transition_to(Signed));
        assert!(Signed.can_transition_to(Broadcast));
        assert!(Broadcast.can_transition_to(Confirming));
        assert!(Confirming.can_transition_to(Committed));
    }

    #[test]
    fn test_no_skipping_or_leaving_terminal_states() {
        use StepState::*;
        assert!(!Built.can_transition_to(Broadcast));
        assert!(!Signed.can_transition_to(Committed));
        assert!(!Broadcast.can_transition_to(Committed));
        assert!(!Committed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Signed));
        assert!(Built.can_transition_to(Failed));
        assert!(Confirming.can_transition_to(Failed));
    }
}

//! Stuck-fund recovery.
//!
//! # Responsibilities
//! - Read both atomic import queues of an account (bounded, constant-interval retry)
//! - Import whatever an interrupted workflow left behind
//! - Report progress to an optional listener
//!
//! # Design Decisions
//! - No local workflow state: the import queues are the only source of truth,
//!   so a scan after a crash or restart sees exactly what is left to do
//! - Running the scanner on empty queues issues no transaction

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::blockchain::ledger::UtxoSource;
use crate::blockchain::types::{Account, Chain, Network, TxId};
use crate::blockchain::utxo::AtomicUtxos;
use crate::config::schema::RetryConfig;
use crate::observability::metrics;
use crate::resilience::retry;
use crate::staking::error::{StakingError, StakingResult};
use crate::staking::executor::TransactionExecutor;
use crate::staking::fees::FeeOracle;
use crate::staking::types::{Operation, Step};

/// Progress notifications emitted while recovering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryEvent {
    /// Queues were read; about to act on them.
    Idle,
    /// Reading the queues failed and is being retried.
    GetAtomicUtxosFailing,
    ImportPStart,
    ImportPFinish,
    ImportCStart,
    ImportCFinish,
}

/// Transactions issued by one recovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub imported_p: Option<TxId>,
    pub imported_c: Option<TxId>,
}

impl RecoveryReport {
    /// True when nothing was stuck.
    pub fn is_noop(&self) -> bool {
        self.imported_p.is_none() && self.imported_c.is_none()
    }
}

pub struct RecoveryScanner {
    utxos: Arc<dyn UtxoSource>,
    executor: Arc<TransactionExecutor>,
    fees: Arc<dyn FeeOracle>,
    network: Network,
    retries: RetryConfig,
}

impl RecoveryScanner {
    pub fn new(
        utxos: Arc<dyn UtxoSource>,
        executor: Arc<TransactionExecutor>,
        fees: Arc<dyn FeeOracle>,
        network: Network,
        retries: RetryConfig,
    ) -> Self {
        Self {
            utxos,
            executor,
            fees,
            network,
            retries,
        }
    }

    /// Read both import queues, retrying at a constant interval.
    pub async fn scan(
        &self,
        account: &Account,
        events: Option<&mpsc::UnboundedSender<RecoveryEvent>>,
    ) -> StakingResult<AtomicUtxos> {
        let utxos = &self.utxos;
        let network = self.network;
        let policy = self.retries.atomic_utxo_policy();

        retry(
            &policy,
            move |attempt| {
                if attempt > 0 {
                    metrics::record_retry("atomic_utxos");
                    emit(events, RecoveryEvent::GetAtomicUtxosFailing);
                }
                utxos.get_atomic_utxos(account, network)
            },
            |_| true,
        )
        .await
        .map_err(|e| {
            let attempts = e.attempts();
            match e.into_error() {
                Some(source) => StakingError::Rpc(source),
                None => StakingError::InvalidRequest(format!(
                    "atomic UTXO query gave up after {} attempts",
                    attempts
                )),
            }
        })
    }

    /// Import any funds an interrupted workflow left in either import queue.
    pub async fn import_any_stuck_funds(
        &self,
        account: &Account,
        events: Option<&mpsc::UnboundedSender<RecoveryEvent>>,
    ) -> StakingResult<RecoveryReport> {
        tracing::debug!(account_index = account.index, "Scanning for stuck funds");

        let atomic = self.scan(account, events).await?;
        emit(events, RecoveryEvent::Idle);

        let mut report = RecoveryReport::default();

        if !atomic.p_chain.is_empty() {
            emit(events, RecoveryEvent::ImportPStart);
            report.imported_p = Some(self.import(account, Operation::ImportP, &atomic).await?);
            emit(events, RecoveryEvent::ImportPFinish);
        }

        if !atomic.c_chain.is_empty() {
            emit(events, RecoveryEvent::ImportCStart);
            report.imported_c = Some(self.import(account, Operation::ImportC, &atomic).await?);
            emit(events, RecoveryEvent::ImportCFinish);
        }

        if report.is_noop() {
            tracing::debug!("No stuck funds");
        }
        Ok(report)
    }

    async fn import(
        &self,
        account: &Account,
        operation: Operation,
        atomic: &AtomicUtxos,
    ) -> StakingResult<TxId> {
        let chain: Chain = operation.chain();
        let queue = atomic.queue(chain);
        tracing::info!(
            chain = %chain,
            utxos = queue.len(),
            amount = queue.total_amount(),
            "Importing stuck funds"
        );

        let step = Step {
            operation,
            amount: queue.total_amount(),
            estimated_fee: self.fees.estimate_fee(account, operation).await?,
        };
        let outcome = self.executor.execute_step(account, &step, None).await?;
        metrics::record_recovery(chain.alias());
        Ok(outcome.tx_id)
    }
}

fn emit(events: Option<&mpsc::UnboundedSender<RecoveryEvent>>, event: RecoveryEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is listening anymore.
        let _ = tx.send(event);
    }
}

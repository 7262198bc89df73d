//! Staking service: the orchestrator's entry point.
//!
//! # Data Flow
//! ```text
//! StakeRequest
//!     → validate against NetworkParams
//!     → read balances + import queues (fresh)
//!     → StepPlanner::compute_steps
//!     → TransactionExecutor::run (one step at a time, each confirmed)
//!     → delegation tx id
//! ```
//!
//! Every workflow runs inside a span tagged with a fresh workflow id.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::blockchain::ledger::{LedgerRpc, UtxoSource};
use crate::blockchain::transaction::TxFactory;
use crate::blockchain::types::{Account, Chain, TxId};
use crate::blockchain::wallet::TxSigner;
use crate::config::schema::OrchestratorConfig;
use crate::staking::error::{StakingError, StakingResult};
use crate::staking::executor::{StepReport, TransactionExecutor};
use crate::staking::fees::FeeOracle;
use crate::staking::params::NetworkParams;
use crate::staking::planner::{PlanningBalances, StepPlanner};
use crate::staking::recovery::{RecoveryEvent, RecoveryReport, RecoveryScanner};
use crate::staking::reward::calc_reward;
use crate::staking::types::{Operation, StakeRequest, Step, Validator};
use crate::staking::validators::{
    get_advanced_sorted_validators, get_filtered_validators, get_random_validator,
    get_simple_sorted_validators, AdvancedSortFilter, ValidatorFilter,
};

/// External collaborators the service is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn LedgerRpc>,
    pub utxos: Arc<dyn UtxoSource>,
    pub factory: Arc<dyn TxFactory>,
    pub signer: Arc<dyn TxSigner>,
    pub fees: Arc<dyn FeeOracle>,
}

/// Result of a completed staking workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeOutcome {
    pub workflow_id: Uuid,
    pub steps: Vec<StepReport>,
    pub delegation_tx_id: TxId,
}

pub struct StakingService {
    ledger: Arc<dyn LedgerRpc>,
    planner: StepPlanner,
    executor: Arc<TransactionExecutor>,
    recovery: RecoveryScanner,
    params: NetworkParams,
    config: OrchestratorConfig,
}

impl StakingService {
    pub fn new(
        collaborators: Collaborators,
        params: NetworkParams,
        config: OrchestratorConfig,
    ) -> Self {
        let executor = Arc::new(TransactionExecutor::new(
            collaborators.ledger.clone(),
            collaborators.factory,
            collaborators.signer,
            collaborators.fees.clone(),
            config.network,
            config.retries.clone(),
            config.fees.clone(),
        ));
        let recovery = RecoveryScanner::new(
            collaborators.utxos,
            executor.clone(),
            collaborators.fees.clone(),
            config.network,
            config.retries.clone(),
        );

        Self {
            ledger: collaborators.ledger,
            planner: StepPlanner::new(collaborators.fees),
            executor,
            recovery,
            params,
            config,
        }
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Reject requests the network would refuse, before anything is built.
    pub fn validate_request(&self, request: &StakeRequest) -> StakingResult<()> {
        if request.amount_to_stake == 0 {
            return Err(StakingError::InvalidRequest(
                "stake amount must be greater than zero".to_string(),
            ));
        }
        if request.amount_to_stake < self.params.min_delegator_stake {
            return Err(StakingError::InvalidRequest(format!(
                "stake {} is below the minimum delegation of {}",
                request.amount_to_stake, self.params.min_delegator_stake
            )));
        }
        if request.end_time <= request.start_time {
            return Err(StakingError::InvalidRequest(
                "end time must be after start time".to_string(),
            ));
        }
        if request.duration_seconds < self.params.min_stake_duration
            || request.duration_seconds > self.params.max_stake_duration
        {
            return Err(StakingError::InvalidRequest(format!(
                "duration {}s outside [{}, {}]",
                request.duration_seconds,
                self.params.min_stake_duration,
                self.params.max_stake_duration
            )));
        }
        if request.delegation_fee_percent < Decimal::ZERO
            || request.delegation_fee_percent > Decimal::ONE_HUNDRED
        {
            return Err(StakingError::InvalidRequest(format!(
                "delegation fee {}% outside [0, 100]",
                request.delegation_fee_percent
            )));
        }
        if request.node_id.is_empty() {
            return Err(StakingError::InvalidRequest("node id is empty".to_string()));
        }
        Ok(())
    }

    /// Fresh balances and import queues of `account`.
    pub async fn balances(&self, account: &Account) -> StakingResult<PlanningBalances> {
        let p_chain = self.ledger.get_balance(Chain::P, account).await?;
        let c_chain = self.ledger.get_balance(Chain::C, account).await?;
        let atomic = self.recovery.scan(account, None).await?;

        Ok(PlanningBalances {
            p_chain: p_chain.in_nano_units(),
            c_chain: c_chain.in_nano_units(),
            pending_p_import: atomic.p_chain.total_amount(),
            pending_c_import: atomic.c_chain.total_amount(),
        })
    }

    /// Plan the steps that would stake `amount` nano units, without executing them.
    pub async fn plan(&self, account: &Account, amount: u64) -> StakingResult<Vec<Step>> {
        let balances = self.balances(account).await?;
        tracing::debug!(?balances, amount, "Planning");
        self.planner.compute_steps(account, &balances, amount).await
    }

    /// Move funds onto the P-Chain as needed and delegate them.
    pub async fn stake(
        &self,
        account: &Account,
        request: &StakeRequest,
    ) -> StakingResult<StakeOutcome> {
        let workflow_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "stake",
            workflow_id = %workflow_id,
            node_id = %request.node_id,
            amount = request.amount_to_stake
        );

        async {
            self.validate_request(request)?;
            let steps = self.plan(account, request.amount_to_stake).await?;
            tracing::info!(steps = steps.len(), "Starting staking workflow");

            let reports = self.executor.run(account, &steps, Some(request)).await?;
            let delegation_tx_id = reports
                .iter()
                .rev()
                .find(|r| r.step.operation == Operation::Delegate)
                .map(|r| r.outcome.tx_id.clone())
                .ok_or_else(|| {
                    StakingError::InvalidRequest("plan contained no delegation".to_string())
                })?;

            tracing::info!(tx_id = %delegation_tx_id, "Staking workflow complete");
            Ok::<_, StakingError>(StakeOutcome {
                workflow_id,
                steps: reports,
                delegation_tx_id,
            })
        }
        .instrument(span)
        .await
    }

    /// Move `amount` nano units of P-Chain funds (typically rewards) back to the C-Chain.
    pub async fn claim_rewards(
        &self,
        account: &Account,
        amount: u64,
    ) -> StakingResult<Vec<StepReport>> {
        let span = tracing::info_span!("claim", workflow_id = %Uuid::new_v4(), amount);

        async {
            let balances = self.balances(account).await?;
            let steps = self
                .planner
                .compute_claim_steps(account, &balances, amount)
                .await?;
            self.executor.run(account, &steps, None).await
        }
        .instrument(span)
        .await
    }

    /// Finish any fund movement an earlier run left half done.
    pub async fn import_any_stuck_funds(
        &self,
        account: &Account,
        events: Option<&mpsc::UnboundedSender<RecoveryEvent>>,
    ) -> StakingResult<RecoveryReport> {
        let span = tracing::info_span!("recover", workflow_id = %Uuid::new_v4());
        self.recovery
            .import_any_stuck_funds(account, events)
            .instrument(span)
            .await
    }

    /// Estimated reward in nano units for delegating `amount` for `duration_seconds`.
    pub async fn estimate_reward(
        &self,
        amount: u64,
        duration_seconds: u64,
        delegation_fee_percent: Decimal,
    ) -> StakingResult<Decimal> {
        let supply = self.ledger.get_current_supply().await?;
        calc_reward(
            amount,
            duration_seconds,
            supply,
            delegation_fee_percent,
            &self.params,
        )
    }

    /// Current validators that pass `filter`, in the requested order.
    pub async fn select_validators(
        &self,
        filter: &ValidatorFilter,
        sort: Option<AdvancedSortFilter>,
    ) -> StakingResult<Vec<Validator>> {
        let validators = self.ledger.get_current_validators().await?;
        let filtered = get_filtered_validators(&validators, filter, &self.params);
        tracing::debug!(
            total = validators.len(),
            eligible = filtered.len(),
            "Validators filtered"
        );

        Ok(match sort {
            Some(sort) => get_advanced_sorted_validators(&filtered, sort),
            None => get_simple_sorted_validators(&filtered),
        })
    }

    /// Pick one validator for `filter`.
    ///
    /// Stakes longer than a year go to the longest-running validator; otherwise
    /// the pick is random among the best five.
    pub async fn pick_validator(&self, filter: &ValidatorFilter) -> StakingResult<Validator> {
        if filter.end_time_over_one_year {
            let sorted = self
                .select_validators(filter, Some(AdvancedSortFilter::DurationHighToLow))
                .await?;
            return sorted.into_iter().next().ok_or(StakingError::NoEligibleValidator);
        }

        let sorted = self.select_validators(filter, None).await?;
        get_random_validator(&sorted, &mut rand::thread_rng())
            .cloned()
            .ok_or(StakingError::NoEligibleValidator)
    }
}

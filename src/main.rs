//! Operator CLI for the staking orchestrator.
//!
//! Runs the read-only operations against a live node: reward estimates,
//! validator selection, step planning, and stuck-fund scans. It never builds,
//! signs, or broadcasts a transaction.

use alloy::primitives::Address;
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use stake_orchestrator::blockchain::transaction::{
    DelegatorParams, ExportParams, ImportParams, SignedTx, TxFactory, UnsignedTx,
};
use stake_orchestrator::blockchain::types::{Account, BlockchainError, BlockchainResult, Network};
use stake_orchestrator::blockchain::wallet::TxSigner;
use stake_orchestrator::blockchain::LedgerClient;
use stake_orchestrator::config::load_config;
use stake_orchestrator::observability::{logging, metrics};
use stake_orchestrator::staking::params::NANO_PER_AVAX;
use stake_orchestrator::staking::reward::nano_to_avax;
use stake_orchestrator::staking::validators::{AdvancedSortFilter, ValidatorFilter};
use stake_orchestrator::staking::{Collaborators, LedgerFeeOracle, NetworkParams, StakingService};
use stake_orchestrator::OrchestratorConfig;

const DAY_SECS: u64 = 24 * 60 * 60;

#[derive(Parser)]
#[command(name = "stake-orchestrator")]
#[command(about = "Cross-chain staking orchestrator (read-only operator tools)", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the delegation reward
    Reward {
        /// Stake in AVAX
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value_t = 14)]
        days: u64,
        /// Validator delegation fee in percent
        #[arg(long, default_value = "2")]
        fee: Decimal,
    },
    /// List validators able to take a delegation
    Validators {
        /// Stake in AVAX
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value_t = 14)]
        days: u64,
        #[arg(long, default_value = "0")]
        min_uptime: Decimal,
        #[arg(long)]
        max_fee: Option<Decimal>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        connected: bool,
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show the steps a stake would take from current balances
    Plan {
        #[command(flatten)]
        account: AccountArgs,
        /// Stake in AVAX
        #[arg(long)]
        amount: Decimal,
    },
    /// Report funds waiting in either import queue
    Scan {
        #[command(flatten)]
        account: AccountArgs,
    },
}

#[derive(clap::Args)]
struct AccountArgs {
    /// Bech32 X/P address body (e.g. avax1...)
    #[arg(long)]
    xp_address: String,
    /// C-Chain address
    #[arg(long)]
    evm_address: String,
    #[arg(long, default_value_t = 0)]
    account_index: u32,
}

impl AccountArgs {
    fn to_account(&self) -> Result<Account, Box<dyn std::error::Error>> {
        let evm_address: Address = self
            .evm_address
            .parse()
            .map_err(|e| format!("invalid EVM address '{}': {}", self.evm_address, e))?;
        Ok(Account {
            index: self.account_index,
            xp_address: self.xp_address.clone(),
            evm_address,
        })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    UptimeDesc,
    UptimeAsc,
    FeeDesc,
    FeeAsc,
    DurationDesc,
    DurationAsc,
}

impl From<SortArg> for AdvancedSortFilter {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::UptimeDesc => AdvancedSortFilter::UpTimeHighToLow,
            SortArg::UptimeAsc => AdvancedSortFilter::UpTimeLowToHigh,
            SortArg::FeeDesc => AdvancedSortFilter::FeeHighToLow,
            SortArg::FeeAsc => AdvancedSortFilter::FeeLowToHigh,
            SortArg::DurationDesc => AdvancedSortFilter::DurationHighToLow,
            SortArg::DurationAsc => AdvancedSortFilter::DurationLowToHigh,
        }
    }
}

/// Stands in for the transaction builder and signer; the CLI never issues transactions.
struct ReadOnly;

fn read_only() -> BlockchainError {
    BlockchainError::NotAvailable("the operator CLI does not issue transactions".to_string())
}

#[async_trait]
impl TxFactory for ReadOnly {
    async fn create_export_tx(&self, _: &ExportParams) -> BlockchainResult<UnsignedTx> {
        Err(read_only())
    }

    async fn create_import_tx(&self, _: &ImportParams) -> BlockchainResult<UnsignedTx> {
        Err(read_only())
    }

    async fn create_delegator_tx(&self, _: &DelegatorParams) -> BlockchainResult<UnsignedTx> {
        Err(read_only())
    }
}

#[async_trait]
impl TxSigner for ReadOnly {
    async fn sign(&self, _: &UnsignedTx, _: u32, _: Network) -> BlockchainResult<SignedTx> {
        Err(read_only())
    }
}

fn avax_to_nano(amount: Decimal) -> Result<u64, Box<dyn std::error::Error>> {
    amount
        .checked_mul(Decimal::from(NANO_PER_AVAX))
        .and_then(|nano| nano.trunc().to_u64())
        .ok_or_else(|| format!("amount {} AVAX out of range", amount).into())
}

fn days_to_secs(days: u64) -> Result<u64, Box<dyn std::error::Error>> {
    days.checked_mul(DAY_SECS)
        .ok_or_else(|| format!("duration of {} days out of range", days).into())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => OrchestratorConfig::default(),
    };

    if let Err(e) = logging::init_logging(&config.observability.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    tracing::info!(
        network = %config.network,
        rpc_url = %config.rpc.url,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            if let Err(e) = metrics::init_metrics(addr) {
                tracing::error!(error = %e, "Failed to start metrics endpoint");
            }
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let client = Arc::new(LedgerClient::new(config.rpc.clone(), config.network)?);
    let fees = Arc::new(LedgerFeeOracle::new(client.clone(), config.fees.clone()));
    let params = NetworkParams::for_network(config.network);
    let service = StakingService::new(
        Collaborators {
            ledger: client.clone(),
            utxos: client,
            factory: Arc::new(ReadOnly),
            signer: Arc::new(ReadOnly),
            fees,
        },
        params,
        config,
    );

    match cli.command {
        Commands::Reward { amount, days, fee } => {
            let reward = service
                .estimate_reward(avax_to_nano(amount)?, days_to_secs(days)?, fee)
                .await?;
            println!("{} AVAX", nano_to_avax(reward).round_dp(2));
        }
        Commands::Validators {
            amount,
            days,
            min_uptime,
            max_fee,
            search,
            connected,
            sort,
            limit,
        } => {
            let end_time = now_secs()
                .checked_add(days_to_secs(days)?)
                .ok_or_else(|| format!("end time {} days from now out of range", days))?;
            let filter = ValidatorFilter {
                min_uptime,
                max_fee,
                search_text: search,
                require_connected: connected,
                end_time_over_one_year: days > 365,
                ..ValidatorFilter::new(avax_to_nano(amount)?, end_time)
            };
            let validators = service.select_validators(&filter, sort.map(Into::into)).await?;
            let shown: Vec<_> = validators.into_iter().take(limit).collect();
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        Commands::Plan { account, amount } => {
            let account = account.to_account()?;
            let steps = service.plan(&account, avax_to_nano(amount)?).await?;
            println!("{}", serde_json::to_string_pretty(&steps)?);
        }
        Commands::Scan { account } => {
            let account = account.to_account()?;
            let balances = service.balances(&account).await?;
            println!(
                "pending P-Chain import: {} nAVAX\npending C-Chain import: {} nAVAX",
                balances.pending_p_import, balances.pending_c_import
            );
        }
    }

    Ok(())
}

//! Staking orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! reward.rs       pure reward estimate
//! validators.rs   filter / rank / pick a validator snapshot
//! planner.rs      balances + stake → ordered steps with fees (fees.rs)
//! executor.rs     build → sign → broadcast → confirm, one step at a time
//! recovery.rs     import queues → finish interrupted movements
//! service.rs      wires the above to injected collaborators
//! ```

pub mod error;
pub mod executor;
pub mod fees;
pub mod params;
pub mod planner;
pub mod recovery;
pub mod reward;
pub mod service;
pub mod types;
pub mod validators;

pub use error::{ErrorKind, StakingError, StakingResult};
pub use executor::{StepReport, StepState, TransactionExecutor};
pub use fees::{FeeOracle, LedgerFeeOracle};
pub use params::NetworkParams;
pub use planner::{PlanningBalances, StepPlanner};
pub use recovery::{RecoveryEvent, RecoveryReport, RecoveryScanner};
pub use service::{Collaborators, StakeOutcome, StakingService};
pub use types::{Operation, StakeRequest, Step, Validator};

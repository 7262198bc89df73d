//! Cross-chain staking orchestrator.
//!
//! Moves funds from the C-Chain to the P-Chain, delegates them to a validator and
//! resumes half-finished fund movements from chain state alone.

pub mod blockchain;
pub mod config;
pub mod observability;
pub mod resilience;
pub mod staking;

pub use config::schema::OrchestratorConfig;
pub use staking::{StakingError, StakingResult, StakingService};

//! Network staking parameters.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::blockchain::types::Network;

/// Nano units per whole token.
pub const NANO_PER_AVAX: u64 = 1_000_000_000;

/// A validator accepts delegations up to this multiple of its own stake.
pub const MAX_VALIDATOR_WEIGHT_FACTOR: u64 = 5;

const DAY_SECS: u64 = 24 * 60 * 60;

/// Reward curve parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardConfig {
    pub min_consumption_rate: Decimal,
    pub max_consumption_rate: Decimal,
    /// Seconds.
    pub minting_period: u64,
    /// Nano units.
    pub supply_cap: u64,
}

/// Protocol constants of one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub reward: RewardConfig,
    /// Nano units.
    pub min_validator_stake: u64,
    /// Nano units.
    pub max_validator_stake: u64,
    /// Nano units.
    pub min_delegator_stake: u64,
    /// Seconds.
    pub min_stake_duration: u64,
    /// Seconds.
    pub max_stake_duration: u64,
}

const REWARD_CONFIG: RewardConfig = RewardConfig {
    min_consumption_rate: dec!(0.10),
    max_consumption_rate: dec!(0.12),
    minting_period: 365 * DAY_SECS,
    supply_cap: 720_000_000 * NANO_PER_AVAX,
};

impl NetworkParams {
    pub fn mainnet() -> Self {
        Self {
            reward: REWARD_CONFIG,
            min_validator_stake: 2_000 * NANO_PER_AVAX,
            max_validator_stake: 3_000_000 * NANO_PER_AVAX,
            min_delegator_stake: 25 * NANO_PER_AVAX,
            min_stake_duration: 14 * DAY_SECS,
            max_stake_duration: 365 * DAY_SECS,
        }
    }

    pub fn testnet() -> Self {
        Self {
            reward: REWARD_CONFIG,
            min_validator_stake: NANO_PER_AVAX,
            max_validator_stake: 3_000_000 * NANO_PER_AVAX,
            min_delegator_stake: NANO_PER_AVAX,
            min_stake_duration: DAY_SECS,
            max_stake_duration: 365 * DAY_SECS,
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::mainnet(),
            Network::Testnet => Self::testnet(),
        }
    }
}

//! Validator filtering, ranking, and selection.
//!
//! # Responsibilities
//! - Compute how much more stake a validator can accept
//! - Filter a validator snapshot against a delegation request
//! - Rank candidates (simple or user-chosen order)
//! - Pick one candidate at random among the best ranked
//!
//! # Design Decisions
//! - Pure functions over a snapshot; no I/O
//! - Sorting is stable, so equal candidates keep the ledger's order
//! - Randomness is injected (`rand::Rng`) for deterministic tests

use rand::Rng;
use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::staking::params::{NetworkParams, MAX_VALIDATOR_WEIGHT_FACTOR};
use crate::staking::types::Validator;

/// Number of top-ranked validators a random pick chooses from.
pub const RANDOM_POOL_SIZE: usize = 5;

/// Total weight (own stake plus delegations) a validator may carry.
pub fn calculate_max_weight(stake_amount: u64, params: &NetworkParams) -> u64 {
    stake_amount
        .saturating_mul(MAX_VALIDATOR_WEIGHT_FACTOR)
        .min(params.max_validator_stake)
}

/// Maximum delegated stake a validator with `stake_amount` may accept.
pub fn max_delegation(stake_amount: u64, params: &NetworkParams) -> u64 {
    calculate_max_weight(stake_amount, params).saturating_sub(stake_amount)
}

/// Delegation capacity still open on `validator`.
pub fn available_delegation_weight(validator: &Validator, params: &NetworkParams) -> u64 {
    max_delegation(validator.stake_amount, params).saturating_sub(validator.delegator_weight)
}

/// Criteria a validator must meet to receive a delegation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorFilter {
    /// Requested stake in nano units; capacity must strictly exceed it.
    pub staking_amount: u64,
    /// Delegation end (unix seconds); the validator must outlive it.
    pub staking_end_time: u64,
    /// Minimum uptime in percent.
    pub min_uptime: Decimal,
    /// Maximum delegation fee in percent.
    pub max_fee: Option<Decimal>,
    /// Case-insensitive substring of the node id.
    pub search_text: Option<String>,
    /// Only keep validators the node currently sees as connected.
    pub require_connected: bool,
    /// Skip the end-time check (the caller will pick the longest-running validator).
    pub end_time_over_one_year: bool,
}

impl ValidatorFilter {
    pub fn new(staking_amount: u64, staking_end_time: u64) -> Self {
        Self {
            staking_amount,
            staking_end_time,
            ..Self::default()
        }
    }

    fn matches(&self, validator: &Validator, needle: Option<&str>, params: &NetworkParams) -> bool {
        if let Some(needle) = needle {
            if !validator.node_id.to_lowercase().contains(needle) {
                return false;
            }
        }
        if available_delegation_weight(validator, params) <= self.staking_amount {
            return false;
        }
        if !self.end_time_over_one_year && validator.end_time <= self.staking_end_time {
            return false;
        }
        if validator.uptime_percent < self.min_uptime {
            return false;
        }
        if let Some(max_fee) = self.max_fee {
            if validator.delegation_fee_percent > max_fee {
                return false;
            }
        }
        !self.require_connected || validator.connected
    }
}

/// Validators that can accept the delegation described by `filter`.
pub fn get_filtered_validators(
    validators: &[Validator],
    filter: &ValidatorFilter,
    params: &NetworkParams,
) -> Vec<Validator> {
    let needle = filter.search_text.as_ref().map(|s| s.to_lowercase());
    validators
        .iter()
        .filter(|v| filter.matches(v, needle.as_deref(), params))
        .cloned()
        .collect()
}

/// Sort by uptime (highest first), then by delegation fee (highest first).
pub fn get_simple_sorted_validators(validators: &[Validator]) -> Vec<Validator> {
    let mut sorted = validators.to_vec();
    sorted.sort_by(|a, b| {
        b.uptime_percent
            .cmp(&a.uptime_percent)
            .then_with(|| b.delegation_fee_percent.cmp(&a.delegation_fee_percent))
    });
    sorted
}

/// User-selectable validator orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvancedSortFilter {
    #[default]
    UpTimeHighToLow,
    UpTimeLowToHigh,
    FeeHighToLow,
    FeeLowToHigh,
    DurationHighToLow,
    DurationLowToHigh,
}

impl AdvancedSortFilter {
    fn compare(&self, a: &Validator, b: &Validator) -> Ordering {
        match self {
            AdvancedSortFilter::UpTimeHighToLow => b.uptime_percent.cmp(&a.uptime_percent),
            AdvancedSortFilter::UpTimeLowToHigh => a.uptime_percent.cmp(&b.uptime_percent),
            AdvancedSortFilter::FeeHighToLow => {
                b.delegation_fee_percent.cmp(&a.delegation_fee_percent)
            }
            AdvancedSortFilter::FeeLowToHigh => {
                a.delegation_fee_percent.cmp(&b.delegation_fee_percent)
            }
            AdvancedSortFilter::DurationHighToLow => b.end_time.cmp(&a.end_time),
            AdvancedSortFilter::DurationLowToHigh => a.end_time.cmp(&b.end_time),
        }
    }
}

pub fn get_advanced_sorted_validators(
    validators: &[Validator],
    sort: AdvancedSortFilter,
) -> Vec<Validator> {
    let mut sorted = validators.to_vec();
    sorted.sort_by(|a, b| sort.compare(a, b));
    sorted
}

/// Uniform pick among the first `min(5, len)` entries of an already sorted list.
pub fn get_random_validator<'a, R: Rng + ?Sized>(
    sorted: &'a [Validator],
    rng: &mut R,
) -> Option<&'a Validator> {
    if sorted.is_empty() {
        return None;
    }
    let pool = sorted.len().min(RANDOM_POOL_SIZE);
    sorted.get(rng.gen_range(0..pool))
}

//! Staking reward estimation.
//!
//! The protocol mints a share of the not-yet-minted supply for every staked
//! token-second. The share grows linearly with the staking period, from the
//! minimum to the maximum consumption rate:
//!
//! ```text
//! ratio  = duration / minting_period
//! ecr    = min_rate * (1 - ratio) + max_rate * ratio
//! full   = (supply_cap - current_supply) * (stake / current_supply) * ratio * ecr
//! reward = full * (1 - fee% / 100)
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::staking::error::{StakingError, StakingResult};
use crate::staking::params::{NetworkParams, NANO_PER_AVAX};

const OP: &str = "reward calculation";

fn overflow() -> StakingError {
    StakingError::ArithmeticOverflow(OP)
}

/// Estimated delegator reward in nano units.
///
/// Returns zero once the supply cap is reached, and for a zero current supply.
pub fn calc_reward(
    stake_amount: u64,
    duration_seconds: u64,
    current_supply: u64,
    delegation_fee_percent: Decimal,
    params: &NetworkParams,
) -> StakingResult<Decimal> {
    let reward = &params.reward;
    if current_supply == 0 || current_supply >= reward.supply_cap {
        return Ok(Decimal::ZERO);
    }
    if delegation_fee_percent < Decimal::ZERO || delegation_fee_percent > Decimal::ONE_HUNDRED {
        return Err(StakingError::InvalidRequest(format!(
            "delegation fee {}% outside [0, 100]",
            delegation_fee_percent
        )));
    }

    let ratio = Decimal::from(duration_seconds)
        .checked_div(Decimal::from(reward.minting_period))
        .ok_or_else(overflow)?;
    let effective_rate = reward
        .min_consumption_rate
        .checked_mul(Decimal::ONE - ratio)
        .and_then(|min_part| {
            reward
                .max_consumption_rate
                .checked_mul(ratio)
                .and_then(|max_part| min_part.checked_add(max_part))
        })
        .ok_or_else(overflow)?;

    let stake_over_supply = Decimal::from(stake_amount)
        .checked_div(Decimal::from(current_supply))
        .ok_or_else(overflow)?;
    let unminted = Decimal::from(reward.supply_cap - current_supply);

    let full = unminted
        .checked_mul(stake_over_supply)
        .and_then(|v| v.checked_mul(ratio))
        .and_then(|v| v.checked_mul(effective_rate))
        .ok_or_else(overflow)?;

    let keep = Decimal::ONE - delegation_fee_percent / Decimal::ONE_HUNDRED;
    full.checked_mul(keep).ok_or_else(overflow)
}

/// Reward floored to whole nano units.
pub fn reward_in_nano_units(reward: Decimal) -> StakingResult<u64> {
    reward.floor().to_u64().ok_or_else(overflow)
}

/// Nano units expressed in whole tokens.
pub fn nano_to_avax(nano: Decimal) -> Decimal {
    nano / Decimal::from(NANO_PER_AVAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const WEEK: u64 = 7 * 24 * 60 * 60;

    #[test]
    fn test_golden_vector() {
        let reward = calc_reward(
            2_000_000 * NANO_PER_AVAX,
            WEEK,
            400_000_000 * NANO_PER_AVAX,
            dec!(2),
            &NetworkParams::testnet(),
        )
        .unwrap();

        assert!((reward - dec!(3018657459185.588)).abs() < dec!(0.01));
        assert_eq!(nano_to_avax(reward).round_dp(2), dec!(3018.66));
        assert_eq!(reward_in_nano_units(reward).unwrap(), 3_018_657_459_185);
    }

    #[test]
    fn test_zero_at_or_above_cap() {
        let params = NetworkParams::mainnet();
        for supply in [params.reward.supply_cap, params.reward.supply_cap + 1, u64::MAX] {
            let reward =
                calc_reward(100 * NANO_PER_AVAX, WEEK, supply, dec!(2), &params).unwrap();
            assert_eq!(reward, Decimal::ZERO);
        }
    }

    #[test]
    fn test_zero_supply_is_zero_reward() {
        let reward =
            calc_reward(NANO_PER_AVAX, WEEK, 0, Decimal::ZERO, &NetworkParams::mainnet()).unwrap();
        assert_eq!(reward, Decimal::ZERO);
    }

    #[test]
    fn test_monotonic_in_stake_and_duration() {
        let params = NetworkParams::mainnet();
        let supply = 450_000_000 * NANO_PER_AVAX;

        let mut previous = Decimal::ZERO;
        for stake in [0, 1, 25 * NANO_PER_AVAX, 1_000 * NANO_PER_AVAX, 3_000_000 * NANO_PER_AVAX] {
            let reward = calc_reward(stake, WEEK, supply, dec!(5), &params).unwrap();
            assert!(reward >= previous);
            previous = reward;
        }

        let mut previous = Decimal::ZERO;
        for duration in [0, 1, WEEK, 30 * WEEK, params.max_stake_duration] {
            let reward =
                calc_reward(100 * NANO_PER_AVAX, duration, supply, dec!(5), &params).unwrap();
            assert!(reward >= previous);
            previous = reward;
        }
    }

    #[test]
    fn test_full_fee_leaves_nothing() {
        let reward = calc_reward(
            1_000 * NANO_PER_AVAX,
            WEEK,
            400_000_000 * NANO_PER_AVAX,
            Decimal::ONE_HUNDRED,
            &NetworkParams::mainnet(),
        )
        .unwrap();
        assert_eq!(reward, Decimal::ZERO);
    }

    #[test]
    fn test_rejects_fee_out_of_range() {
        let err = calc_reward(1, WEEK, 1, dec!(101), &NetworkParams::mainnet()).unwrap_err();
        assert!(matches!(err, StakingError::InvalidRequest(_)));
    }
}

//! Locked-deposit interest.
//!
//! A deposit locks its principal for one of eight block-day tiers and
//! accrues interest at the tier's per-100-block-day rate. Rates are held
//! in 10^-7 units so the payable amount is a pure integer computation.

use crate::amount::Amount;
use crate::params::{ConsensusParams, LOCK_RATES_E7};

/// Interest rate of a tier per 100 block-days; out of range reads as zero.
pub fn interest_rate(tier: usize) -> f64 {
    LOCK_RATES_E7
        .get(tier)
        .map(|&r| r as f64 / 1e7)
        .unwrap_or(0.0)
}

/// The tier index for a lock duration: the highest tier whose threshold
/// the duration reaches. Rates stop at tier 6; the duplicated top
/// threshold maps there as well.
pub fn lock_tier(lock_blocks: u32, params: &ConsensusParams) -> Option<usize> {
    for tier in (0..LOCK_RATES_E7.len()).rev() {
        if lock_blocks >= params.lock_thresholds[tier] {
            return Some(tier);
        }
    }
    None
}

/// Clamp a lock duration down to the largest tier threshold it reaches,
/// or 0 when it reaches none.
pub fn adjust_to_lock_threshold(lock_blocks: u32, params: &ConsensusParams) -> u32 {
    for tier in (0..params.lock_thresholds.len()).rev() {
        if lock_blocks >= params.lock_thresholds[tier] {
            return params.lock_thresholds[tier];
        }
    }
    0
}

/// Interest payable on `principal` locked for `lock_blocks`.
///
/// The duration is clamped to its tier threshold first;
/// `interest = principal * rate * lock_days / 100`, truncated.
pub fn lock_interest(principal: Amount, lock_blocks: u32, params: &ConsensusParams) -> Amount {
    let adjusted = adjust_to_lock_threshold(lock_blocks, params);
    if adjusted == 0 || principal <= 0 {
        return 0;
    }
    let tier = match lock_tier(adjusted, params) {
        Some(t) => t,
        None => return 0,
    };
    let days = (adjusted / params.blocks_per_day) as u128;
    let rate_e7 = LOCK_RATES_E7[tier] as u128;
    (principal as u128 * rate_e7 * days / (10_000_000 * 100)) as Amount
}

/// The interest ledger snapshot behind `getinterestinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestInfo {
    pub total: Amount,
    pub left: Amount,
    pub left_percentage: u32,
    pub period_total: Amount,
    pub period_taken: Amount,
    pub period_taken_percentage: u32,
}

/// Summarize the interest budget at the current tip.
///
/// The accrual period is one interest interval (100 block-days); the
/// period budget is the remaining allocation at period start scaled by
/// the tier-0 rate.
pub fn interest_info(
    params: &ConsensusParams,
    tip_chain_interest: u64,
    period_start_chain_interest: u64,
) -> InterestInfo {
    let total = params.total_interest;
    let left = total.saturating_sub(tip_chain_interest);
    let left_at_start = total.saturating_sub(period_start_chain_interest);
    let period_total =
        (left_at_start as u128 * LOCK_RATES_E7[0] as u128 / 10_000_000) as u64;
    let period_taken = tip_chain_interest.saturating_sub(period_start_chain_interest);

    let left_percentage = if total == 0 {
        0
    } else {
        (left as u128 * 100 / total as u128) as u32
    };
    let period_taken_percentage = if period_total == 0 {
        0
    } else {
        (period_taken as u128 * 100 / period_total as u128).min(100) as u32
    };

    InterestInfo {
        total: total as Amount,
        left: left as Amount,
        left_percentage,
        period_total: period_total as Amount,
        period_taken: period_taken as Amount,
        period_taken_percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::COIN;
    use crate::chainparams::{ChainParams, Network};

    fn main_consensus() -> ConsensusParams {
        ChainParams::for_network(Network::Main).consensus.clone()
    }

    #[test]
    fn rate_lookup_out_of_range_is_zero() {
        assert!((interest_rate(0) - 0.0142857).abs() < 1e-12);
        assert!((interest_rate(6) - 0.0999999).abs() < 1e-12);
        assert_eq!(interest_rate(7), 0.0);
        assert_eq!(interest_rate(100), 0.0);
    }

    #[test]
    fn threshold_adjustment() {
        let c = main_consensus();
        let day = c.blocks_per_day;
        assert_eq!(adjust_to_lock_threshold(16 * day, &c), 16 * day);
        assert_eq!(adjust_to_lock_threshold(16 * day + 5, &c), 16 * day);
        assert_eq!(adjust_to_lock_threshold(31 * day, &c), 16 * day);
        assert_eq!(adjust_to_lock_threshold(32 * day, &c), 32 * day);
        assert_eq!(adjust_to_lock_threshold(5000 * day, &c), 1024 * day);
        assert_eq!(adjust_to_lock_threshold(15 * day, &c), 0);
        assert_eq!(adjust_to_lock_threshold(0, &c), 0);
    }

    #[test]
    fn tier_of_top_threshold_is_six() {
        let c = main_consensus();
        assert_eq!(lock_tier(1024 * c.blocks_per_day, &c), Some(6));
        assert_eq!(lock_tier(16 * c.blocks_per_day, &c), Some(0));
        assert_eq!(lock_tier(1, &c), None);
    }

    #[test]
    fn sixteen_day_deposit_interest() {
        // principal 123.456 coins for 16 days at 0.0142857 per 100 days.
        let c = main_consensus();
        let principal = 12_345_600_000;
        let interest = lock_interest(principal, 16 * c.blocks_per_day, &c);
        assert_eq!(interest, 28_218_486);
    }

    #[test]
    fn unreachable_tier_pays_nothing() {
        let c = main_consensus();
        assert_eq!(lock_interest(100 * COIN, 3, &c), 0);
        assert_eq!(lock_interest(0, 16 * c.blocks_per_day, &c), 0);
    }

    #[test]
    fn interest_scales_with_tier_and_days() {
        let c = main_consensus();
        let p = 1000 * COIN;
        let t16 = lock_interest(p, 16 * c.blocks_per_day, &c);
        let t32 = lock_interest(p, 32 * c.blocks_per_day, &c);
        // Twice the rate on twice the days.
        assert_eq!(t32, t16 * 4);
    }

    #[test]
    fn info_percentages() {
        let c = main_consensus();
        let info = interest_info(&c, c.total_interest / 2, c.total_interest / 2);
        assert_eq!(info.left_percentage, 50);
        assert_eq!(info.period_taken, 0);

        let start = c.total_interest / 2;
        let info = interest_info(&c, start + 1000, start);
        assert_eq!(info.period_taken, 1000);
        assert!(info.period_total > 0);
    }
}

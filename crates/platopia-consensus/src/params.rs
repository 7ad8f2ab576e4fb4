//! Network consensus parameters.

use crate::amount::Amount;

/// Lock-duration tiers, in block-days. The last two tiers share a bound:
/// deposits beyond 1024 days are clamped down to it.
pub const LOCK_TIER_DAYS: [u32; 8] = [16, 32, 64, 128, 256, 512, 1024, 1024];

/// Per-tier interest rate for 100 block-days, in 10^-7 units.
/// Tier 0 is 0.0142857, each tier up adds the same step, the top tier
/// stops just short of 0.1.
pub const LOCK_RATES_E7: [u64; 7] = [142_857, 285_714, 428_571, 571_428, 714_285, 857_142, 999_999];

/// Immutable consensus parameters of one network.
#[derive(Debug, Clone)]
pub struct ConsensusParams {
    pub blocks_per_day: u32,
    pub days_per_century: u32,
    pub blocks_per_century: u32,
    pub subsidy_halving_interval: u32,
    /// Multiplicative per-century subsidy decay, exactly 9/10.
    pub decay_ratio: f64,

    /// Lifetime cap on distributed interest.
    pub total_interest: u64,
    /// Lock-duration tiers in blocks.
    pub lock_thresholds: [u32; 8],

    /// Per-block subsidy base of the continued chain.
    pub block_reward: Amount,
    /// Value of the single genesis coinbase output.
    pub genesis_reward: Amount,
    /// Interest already distributed on the old chain, carried into the
    /// genesis header.
    pub genesis_chain_interest: u64,

    /// Proof-of-work limit as a big-endian 256-bit target.
    pub pow_limit: [u8; 32],
    pub pow_target_timespan: u32,
    pub pow_target_spacing: u32,
    pub allow_min_difficulty_blocks: bool,
    pub no_retargeting: bool,
}

impl ConsensusParams {
    /// Difficulty retarget interval in blocks.
    pub fn difficulty_adjustment_interval(&self) -> u32 {
        self.pow_target_timespan / self.pow_target_spacing
    }

    /// One interest accrual period: 100 block-days.
    pub fn blocks_interest_interval(&self) -> u32 {
        self.blocks_per_day * 100
    }

    /// Century index of a block height; height 0 counts as century 1.
    pub fn century_for_block(&self, height: u32) -> u32 {
        if height == 0 {
            return 1;
        }
        (height - 1) / self.blocks_per_century + 1
    }

    /// First block height of a century.
    pub fn first_block_in_century(&self, century: u32) -> u32 {
        (century - 1) * self.blocks_per_century + 1
    }

    /// Last block height of a century.
    pub fn last_block_in_century(&self, century: u32) -> u32 {
        century * self.blocks_per_century
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chainparams::{ChainParams, Network};

    #[test]
    fn century_boundaries() {
        let params = ChainParams::for_network(Network::Main);
        let c = &params.consensus;
        assert_eq!(c.blocks_per_century, 288_000);
        assert_eq!(c.century_for_block(0), 1);
        assert_eq!(c.century_for_block(1), 1);
        assert_eq!(c.century_for_block(288_000), 1);
        assert_eq!(c.century_for_block(288_001), 2);
        assert_eq!(c.first_block_in_century(2), 288_001);
        assert_eq!(c.last_block_in_century(2), 576_000);
    }

    #[test]
    fn lock_rate_table_steps() {
        for (i, rate) in LOCK_RATES_E7.iter().enumerate().take(6) {
            assert_eq!(*rate, 142_857 * (i as u64 + 1));
        }
        assert_eq!(LOCK_RATES_E7[6], 999_999);
    }
}

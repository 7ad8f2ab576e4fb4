//! The monetary schedule.
//!
//! All geometric factors are computed exactly as `floor(base * 9^k / 10^k)`
//! with big integers. The historical implementation used `pow(0.9, k)` in
//! doubles; the exact form reproduces every value it ever produced while
//! staying platform-independent.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::amount::{Amount, COIN};
use crate::params::ConsensusParams;

/// Old-chain per-block base: 1560 coins (one third of 4680).
const OLD_CHAIN_BLOCK_BASE: Amount = 1560 * COIN;

/// Endowment of the old chain's own genesis block.
const OLD_CHAIN_GENESIS_ENDOWMENT: Amount = 499_200_000 * COIN;

/// Lottery prize base per century winner; a century pays 100 winners.
const LOTTERY_BASE: Amount = 100_000 * COIN;

/// Past this many centuries every decayed value has reached zero.
const DECAY_EXHAUSTED: u32 = 256;

/// `floor(base * (9/10)^k)`, exact.
fn decayed(base: Amount, k: u32) -> Amount {
    if k >= DECAY_EXHAUSTED {
        return 0;
    }
    let value = BigUint::from(base as u64) * BigUint::from(9u32).pow(k)
        / BigUint::from(10u32).pow(k);
    value.to_u64().map(|v| v as Amount).unwrap_or(0)
}

/// Block subsidy of the continued chain at `height`.
///
/// The base is `block_reward` (the old chain already consumed five
/// centuries of decay) and it halves geometrically per century; height 0
/// sits in century 1.
pub fn block_subsidy(height: u32, params: &ConsensusParams) -> Amount {
    let k = params.century_for_block(height) - 1;
    decayed(params.block_reward, k)
}

/// Per-block subsidy of the old chain at `height` (base 1560 coins).
pub fn old_chain_subsidy(height: u32, params: &ConsensusParams) -> Amount {
    let k = params.century_for_block(height) - 1;
    decayed(OLD_CHAIN_BLOCK_BASE, k)
}

/// Total old-chain issuance from its genesis through `height_cap`:
/// the genesis endowment plus every complete or partial century at that
/// century's per-block subsidy.
pub fn cumulative_subsidy(height_cap: u32, params: &ConsensusParams) -> Amount {
    let interval = params.subsidy_halving_interval;
    let mut total = OLD_CHAIN_GENESIS_ENDOWMENT;
    let full_centuries = height_cap / interval;
    let remainder = height_cap % interval;
    for i in 0..full_centuries {
        total += old_chain_subsidy(interval * i + 1, params) * interval as Amount;
    }
    if remainder > 0 {
        total += old_chain_subsidy(interval * full_centuries + 1, params) * remainder as Amount;
    }
    total
}

/// Old-chain lottery payout through `century`: a decaying per-winner prize,
/// one hundred winners per century.
pub fn century_lottery(century: u32) -> Amount {
    let mut total: Amount = 0;
    for i in 1..=century {
        total += decayed(LOTTERY_BASE, i - 1);
    }
    total * 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{money_range, MAX_MONEY};
    use crate::chainparams::{ChainParams, Network};

    fn main_consensus() -> ConsensusParams {
        ChainParams::for_network(Network::Main).consensus.clone()
    }

    #[test]
    fn subsidy_base_is_first_new_chain_century() {
        let c = main_consensus();
        // 1560 * 0.9^5 coins.
        assert_eq!(c.block_reward, 92_116_440_000);
        assert_eq!(block_subsidy(0, &c), 92_116_440_000);
        assert_eq!(block_subsidy(1, &c), 92_116_440_000);
    }

    #[test]
    fn subsidy_halving_ladder() {
        // floor(921.1644 COIN * 0.9^k) at the first block of each century,
        // computed by iterated decimal decay.
        let c = main_consensus();
        let mut num = BigUint::from(c.block_reward as u64);
        let mut den = BigUint::from(1u32);
        for k in 0..241u32 {
            let height = k * c.subsidy_halving_interval + 1;
            let expected = (num.clone() / den.clone()).to_u64().unwrap() as Amount;
            assert_eq!(block_subsidy(height, &c), expected, "century {k}");
            assert!(block_subsidy(height, &c) <= c.block_reward);
            num *= 9u32;
            den *= 10u32;
        }
        assert_eq!(block_subsidy(241 * c.subsidy_halving_interval, &c), 0);
    }

    #[test]
    fn subsidy_decays_by_exact_ratio() {
        let c = main_consensus();
        for k in 0..20u32 {
            let h = k * c.subsidy_halving_interval + 1;
            let this = block_subsidy(h, &c);
            let next = block_subsidy(h + c.subsidy_halving_interval, &c);
            // Equal up to integer truncation.
            assert!(next >= this * 9 / 10);
            assert!(next <= this * 9 / 10 + 1);
        }
    }

    #[test]
    fn subsidy_terminates() {
        let c = main_consensus();
        assert_eq!(block_subsidy(241 * c.subsidy_halving_interval, &c), 0);
        assert_eq!(block_subsidy(300 * c.subsidy_halving_interval, &c), 0);
        assert_eq!(block_subsidy(u32::MAX, &c), 0);
    }

    #[test]
    fn subsidy_sum_matches_reference_total() {
        let c = main_consensus();
        let mut sum: Amount = 0;
        let mut height: u32 = 0;
        while height < 14_000_000 {
            let subsidy = block_subsidy(height, &c);
            assert!(subsidy <= 92_116_440_000);
            sum += 1000 * subsidy;
            assert!(money_range(sum));
            height += 1000;
        }
        assert_eq!(sum, 263_802_041_678_005_000);
        assert!(sum < MAX_MONEY);
    }

    #[test]
    fn regtest_ladder_matches_main() {
        // Same base, shorter centuries.
        let c = ChainParams::for_network(Network::Regtest).consensus.clone();
        assert_eq!(c.block_reward, 92_116_440_000);
        assert_eq!(block_subsidy(1, &c), 92_116_440_000);
        assert_eq!(
            block_subsidy(c.subsidy_halving_interval + 1, &c),
            92_116_440_000 * 9 / 10
        );
    }

    #[test]
    fn old_chain_century_values() {
        let c = main_consensus();
        let expected = [
            156_000_000_000i64,
            140_400_000_000,
            126_360_000_000,
            113_724_000_000,
            102_351_600_000,
            92_116_440_000,
        ];
        for (i, want) in expected.iter().enumerate() {
            let height = c.subsidy_halving_interval * i as u32 + 1;
            assert_eq!(old_chain_subsidy(height, &c), *want);
        }
    }

    #[test]
    fn genesis_endowment_components() {
        let c = main_consensus();
        assert_eq!(cumulative_subsidy(1_440_000, &c), 233_904_652_800_000_000);
        assert_eq!(century_lottery(5), 4_095_100_000_000_000);
        assert_eq!(c.genesis_reward, 277_168_043_292_526_951);

        let r = ChainParams::for_network(Network::Regtest).consensus.clone();
        assert_eq!(r.genesis_reward, 93_375_041_172_526_951);
    }
}

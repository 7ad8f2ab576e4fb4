//! # platopia-consensus
//!
//! Consensus-level building blocks for the Platopia blockchain:
//! - Monetary amounts and fee rates
//! - Transaction and block primitives with the canonical wire encoding
//! - Chain parameter sets (`main`, `test`, `regtest`) and genesis construction
//! - The century-decay subsidy schedule and locked-deposit interest schedule
//! - Compact difficulty bits and next-work calculation
//!
//! Everything here is deterministic and free of I/O; the chain itself is
//! reached through the [`ChainView`] trait so that validation and storage
//! stay external collaborators.

mod amount;
mod block;
mod chain;
mod chainparams;
mod error;
mod interest;
mod params;
mod pow;
mod script;
mod serialize;
mod subsidy;
mod transaction;

pub use amount::{money_range, Amount, FeeRate, COIN, MAX_MONEY};
pub use block::{block_merkle_root, BaseHeader, Block, BlockHash, BlockHeader, EthHash};
pub use chain::{ChainTip, ChainView, HeaderChain};
pub use chainparams::{params, select_params, ChainParams, Network};
pub use error::{ConsensusError, ConsensusResult};
pub use interest::{
    adjust_to_lock_threshold, interest_info, interest_rate, lock_interest, lock_tier, InterestInfo,
};
pub use params::{ConsensusParams, LOCK_RATES_E7, LOCK_TIER_DAYS};
pub use pow::{boundary_from_compact, compact_from_target, next_work_required, target_from_compact};
pub use script::Script;
pub use subsidy::{block_subsidy, century_lottery, cumulative_subsidy, old_chain_subsidy};
pub use transaction::{allow_free, OutPoint, Transaction, TxId, TxIn, TxOut, TX_FLAGS_COINBASE};

/// Coinbase outputs stay locked for this many blocks.
pub const COINBASE_MATURITY: u32 = 100;

/// Hard cap on a single block's serialized size.
pub const MAX_BLOCK_SIZE: u64 = 8_000_000;

/// Default cap for locally generated blocks.
pub const DEFAULT_MAX_GENERATED_BLOCK_SIZE: u64 = 2_000_000;

/// Default minimum fee rate (per kB) for block inclusion.
pub const DEFAULT_BLOCK_MIN_TX_FEE: Amount = 1000;

/// Default share of a generated block reserved for coin-age priority
/// transactions, in percent.
pub const DEFAULT_BLOCK_PRIORITY_PERCENTAGE: u8 = 5;

/// Sig-op allowance per started megabyte of block size.
pub const MAX_BLOCK_SIGOPS_PER_MB: u64 = 20_000;

/// Maximum sig-op count for a block of the given serialized size.
pub fn max_block_sigops(block_size: u64) -> u64 {
    ((block_size.saturating_sub(1) / 1_000_000) + 1) * MAX_BLOCK_SIGOPS_PER_MB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigops_scale_per_megabyte() {
        assert_eq!(max_block_sigops(1), 20_000);
        assert_eq!(max_block_sigops(1_000_000), 20_000);
        assert_eq!(max_block_sigops(1_000_001), 40_000);
        assert_eq!(max_block_sigops(8_000_000), 160_000);
    }
}

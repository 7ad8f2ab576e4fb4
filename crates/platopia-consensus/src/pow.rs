//! Compact difficulty bits and next-work calculation.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::block::EthHash;
use crate::chain::{ChainTip, ChainView};
use crate::error::{ConsensusError, ConsensusResult};
use crate::params::ConsensusParams;

/// Expand compact bits into a 256-bit target.
///
/// Rejects the negative-sign encoding, zero targets and mantissas that
/// overflow 256 bits.
pub fn target_from_compact(bits: u32) -> ConsensusResult<BigUint> {
    let size = (bits >> 24) as u32;
    let mut word = bits & 0x007f_ffff;
    let negative = bits & 0x0080_0000 != 0;
    if negative {
        return Err(ConsensusError::InvalidCompactTarget(bits));
    }

    let target = if size <= 3 {
        word >>= 8 * (3 - size);
        BigUint::from(word)
    } else {
        BigUint::from(word) << (8 * (size - 3))
    };
    if target.is_zero() {
        return Err(ConsensusError::InvalidCompactTarget(bits));
    }
    // Overflow: mantissa pushed past 256 bits.
    if word != 0 && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32)) {
        return Err(ConsensusError::InvalidCompactTarget(bits));
    }
    Ok(target)
}

/// Compress a 256-bit target back into compact bits.
pub fn compact_from_target(target: &BigUint) -> u32 {
    let mut size = (target.bits() as u32 + 7) / 8;
    let mut compact: u32 = if size <= 3 {
        let low: u32 = target.iter_u32_digits().next().unwrap_or(0);
        low << (8 * (3 - size))
    } else {
        let shifted = target >> (8 * (size - 3));
        shifted.iter_u32_digits().next().unwrap_or(0)
    };
    // Carry the sign bit out of the mantissa.
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | (size << 24)
}

/// The mining boundary for compact bits: the target as a big-endian
/// 256-bit value in the Ethash domain.
pub fn boundary_from_compact(bits: u32) -> ConsensusResult<EthHash> {
    let target = target_from_compact(bits)?;
    Ok(boundary_from_target(&target))
}

fn boundary_from_target(target: &BigUint) -> EthHash {
    let bytes = target.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    EthHash(out)
}

fn pow_limit_target(params: &ConsensusParams) -> BigUint {
    BigUint::from_bytes_be(&params.pow_limit)
}

/// Work required for the block after `prev`.
///
/// Regtest never retargets. Networks that allow min-difficulty blocks
/// fall back to the proof-of-work limit when the new block's time is more
/// than twice the target spacing past the tip. Otherwise difficulty
/// adjusts once per interval against the clamped actual timespan.
pub fn next_work_required(
    prev: &ChainTip,
    new_block_time: u32,
    chain: &dyn ChainView,
    params: &ConsensusParams,
) -> u32 {
    if params.no_retargeting {
        return prev.bits;
    }

    let interval = params.difficulty_adjustment_interval();
    let next_height = prev.height + 1;

    if params.allow_min_difficulty_blocks
        && new_block_time > prev.time + 2 * params.pow_target_spacing
    {
        return compact_from_target(&pow_limit_target(params));
    }

    if next_height % interval != 0 {
        return prev.bits;
    }

    let first_height = next_height - interval;
    let first_time = chain
        .header_at(first_height)
        .map(|h| h.time)
        .unwrap_or(prev.time);

    let mut actual = prev.time.saturating_sub(first_time);
    let timespan = params.pow_target_timespan;
    actual = actual.clamp(timespan / 4, timespan * 4);

    let old_target = match target_from_compact(prev.bits) {
        Ok(t) => t,
        Err(_) => return prev.bits,
    };
    let mut new_target = old_target * BigUint::from(actual) / BigUint::from(timespan);
    let limit = pow_limit_target(params);
    if new_target > limit {
        new_target = limit;
    }
    compact_from_target(&new_target)
}

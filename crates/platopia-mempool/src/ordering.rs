//! Ancestor-score ordering.
//!
//! Packages are ranked by `ancestor_mod_fees / ancestor_size`. The ratio
//! is never materialized; comparisons cross-multiply in 128 bits so equal
//! rates compare equal regardless of package size, with the transaction
//! id as the deterministic tie-break.

use std::cmp::Ordering;

use platopia_consensus::{Amount, TxId};

/// Sort key of one package in an ancestor-score index. Orders best
/// (highest fee rate) first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorScoreKey {
    pub mod_fees: Amount,
    pub size: u64,
    pub txid: TxId,
}

impl AncestorScoreKey {
    pub fn new(mod_fees: Amount, size: u64, txid: TxId) -> Self {
        Self {
            mod_fees,
            size,
            txid,
        }
    }
}

impl Ord for AncestorScoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.mod_fees as i128 * other.size as i128;
        let rhs = other.mod_fees as i128 * self.size as i128;
        // Reversed so the best rate sorts first in a BTreeSet.
        rhs.cmp(&lhs).then_with(|| self.txid.cmp(&other.txid))
    }
}

impl PartialOrd for AncestorScoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn higher_rate_sorts_first() {
        let mut set = BTreeSet::new();
        set.insert(AncestorScoreKey::new(1000, 100, TxId([1; 32]))); // 10/byte
        set.insert(AncestorScoreKey::new(3000, 100, TxId([2; 32]))); // 30/byte
        set.insert(AncestorScoreKey::new(2000, 100, TxId([3; 32]))); // 20/byte

        let order: Vec<_> = set.iter().map(|k| k.txid).collect();
        assert_eq!(order, vec![TxId([2; 32]), TxId([3; 32]), TxId([1; 32])]);
    }

    #[test]
    fn equal_rate_breaks_ties_by_txid() {
        let mut set = BTreeSet::new();
        // 2000/200 == 1000/100.
        set.insert(AncestorScoreKey::new(2000, 200, TxId([9; 32])));
        set.insert(AncestorScoreKey::new(1000, 100, TxId([1; 32])));

        let order: Vec<_> = set.iter().map(|k| k.txid).collect();
        assert_eq!(order, vec![TxId([1; 32]), TxId([9; 32])]);
    }

    #[test]
    fn cross_multiplication_avoids_truncation() {
        // 3/1000 vs 2/667: 3*667 = 2001 > 2*1000, so the first is better
        // even though both truncate to zero per-byte.
        let a = AncestorScoreKey::new(3, 1000, TxId([1; 32]));
        let b = AncestorScoreKey::new(2, 667, TxId([2; 32]));
        assert_eq!(a.cmp(&b), Ordering::Less);
    }
}

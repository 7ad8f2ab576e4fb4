//! The transaction pool.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, warn};

use platopia_consensus::{Amount, Transaction, TxId};

use crate::entry::MempoolEntry;
use crate::error::{MempoolError, MempoolResult};
use crate::ordering::AncestorScoreKey;
use crate::DEFAULT_MAX_TRANSACTIONS;

/// Mempool configuration.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum number of pooled transactions; the worst package is
    /// evicted beyond it.
    pub max_transactions: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: DEFAULT_MAX_TRANSACTIONS,
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<TxId, MempoolEntry>,
    by_ancestor_score: BTreeSet<AncestorScoreKey>,
}

impl Inner {
    fn score_key(entry: &MempoolEntry) -> AncestorScoreKey {
        AncestorScoreKey::new(entry.ancestor_mod_fees, entry.ancestor_size, entry.txid())
    }

    /// All unconfirmed ancestors of `txid`, excluding itself.
    fn ancestors_of(&self, txid: &TxId) -> BTreeSet<TxId> {
        let mut found = BTreeSet::new();
        let mut queue: VecDeque<TxId> = match self.entries.get(txid) {
            Some(entry) => entry.parents.iter().copied().collect(),
            None => return found,
        };
        while let Some(id) = queue.pop_front() {
            if !found.insert(id) {
                continue;
            }
            if let Some(entry) = self.entries.get(&id) {
                queue.extend(entry.parents.iter().copied());
            }
        }
        found
    }

    /// All unconfirmed descendants of `txid`, excluding itself.
    fn descendants_of(&self, txid: &TxId) -> BTreeSet<TxId> {
        let mut found = BTreeSet::new();
        let mut queue: VecDeque<TxId> = match self.entries.get(txid) {
            Some(entry) => entry.children.iter().copied().collect(),
            None => return found,
        };
        while let Some(id) = queue.pop_front() {
            if !found.insert(id) {
                continue;
            }
            if let Some(entry) = self.entries.get(&id) {
                queue.extend(entry.children.iter().copied());
            }
        }
        found
    }

    /// Remove one entry, fixing the package statistics and links of every
    /// remaining relative.
    fn remove_entry(&mut self, txid: &TxId) -> Option<MempoolEntry> {
        let entry = self.entries.get(txid)?.clone();
        self.by_ancestor_score.remove(&Self::score_key(&entry));

        for desc_id in self.descendants_of(txid) {
            if let Some(desc) = self.entries.get(&desc_id) {
                self.by_ancestor_score.remove(&Self::score_key(desc));
            }
            if let Some(desc) = self.entries.get_mut(&desc_id) {
                desc.ancestor_size -= entry.size;
                desc.ancestor_mod_fees -= entry.modified_fee;
                desc.ancestor_sigops -= entry.sigop_count;
                desc.ancestor_count -= 1;
                desc.parents.remove(txid);
            }
            if let Some(desc) = self.entries.get(&desc_id) {
                self.by_ancestor_score.insert(Self::score_key(desc));
            }
        }
        for anc_id in self.ancestors_of(txid) {
            if let Some(anc) = self.entries.get_mut(&anc_id) {
                anc.descendant_count -= 1;
                anc.children.remove(txid);
            }
        }
        self.entries.remove(txid)
    }
}

/// The transaction memory pool.
///
/// A single lock guards the entry map and the ancestor-score index so the
/// template builder sees one coherent snapshot for the whole build.
/// Prioritisation deltas live in their own concurrent map: they survive
/// the transaction leaving and re-entering the pool.
pub struct Mempool {
    config: MempoolConfig,
    inner: RwLock<Inner>,
    deltas: DashMap<TxId, (f64, Amount)>,
}

impl Mempool {
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner::default()),
            deltas: DashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MempoolConfig::default())
    }

    /// Add a transaction.
    ///
    /// `entry_priority` and `in_chain_input_value` seed the coin-age
    /// priority; fee and input values were computed by the caller against
    /// the UTXO view.
    pub fn add(
        &self,
        tx: Arc<Transaction>,
        fee: Amount,
        entry_height: u32,
        entry_priority: f64,
        in_chain_input_value: Amount,
    ) -> MempoolResult<()> {
        let txid = tx.id();
        if tx.is_coinbase() {
            return Err(MempoolError::Coinbase(txid.to_string()));
        }
        let interest = tx.interest()?;

        let mut inner = self.inner.write();
        if inner.entries.contains_key(&txid) {
            return Err(MempoolError::AlreadyExists(txid.to_string()));
        }

        let mut entry = MempoolEntry::new(
            tx,
            fee,
            interest,
            entry_height,
            entry_priority,
            in_chain_input_value,
        );
        if let Some(delta) = self.deltas.get(&txid) {
            entry.modified_fee += delta.1;
            entry.ancestor_mod_fees += delta.1;
        }

        for input in &entry.tx.inputs {
            if inner.entries.contains_key(&input.prevout.hash) {
                entry.parents.insert(input.prevout.hash);
            }
        }

        let mut ancestors = BTreeSet::new();
        let mut queue: VecDeque<TxId> = entry.parents.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if !ancestors.insert(id) {
                continue;
            }
            if let Some(parent) = inner.entries.get(&id) {
                queue.extend(parent.parents.iter().copied());
            }
        }
        for anc_id in &ancestors {
            let anc = inner.entries.get(anc_id).expect("ancestor present");
            entry.ancestor_size += anc.size;
            entry.ancestor_mod_fees += anc.modified_fee;
            entry.ancestor_sigops += anc.sigop_count;
            entry.ancestor_count += 1;
        }
        for anc_id in &ancestors {
            if let Some(anc) = inner.entries.get_mut(anc_id) {
                anc.descendant_count += 1;
            }
        }
        for parent_id in entry.parents.clone() {
            if let Some(parent) = inner.entries.get_mut(&parent_id) {
                parent.children.insert(txid);
            }
        }

        inner.by_ancestor_score.insert(Inner::score_key(&entry));
        inner.entries.insert(txid, entry);
        debug!(tx = %txid, pooled = inner.entries.len(), "Transaction added to mempool");

        if inner.entries.len() > self.config.max_transactions {
            if let Some(worst) = inner.by_ancestor_score.iter().next_back().map(|k| k.txid) {
                // Descendants go with it; they are now unmineable anyway.
                let mut doomed = inner.descendants_of(&worst);
                doomed.insert(worst);
                for id in doomed {
                    inner.remove_entry(&id);
                }
                warn!(tx = %worst, "Mempool full, evicted lowest ancestor-score package");
            }
        }
        Ok(())
    }

    /// Remove transactions confirmed by a connected block, in block order.
    pub fn remove_for_block(&self, txids: &[TxId]) {
        let mut inner = self.inner.write();
        for txid in txids {
            inner.remove_entry(txid);
        }
    }

    /// Remove one transaction and everything that descends from it.
    pub fn remove_subtree(&self, txid: &TxId) -> MempoolResult<()> {
        let mut inner = self.inner.write();
        if !inner.entries.contains_key(txid) {
            return Err(MempoolError::NotFound(txid.to_string()));
        }
        let mut doomed = inner.descendants_of(txid);
        doomed.insert(*txid);
        for id in doomed {
            inner.remove_entry(&id);
        }
        Ok(())
    }

    /// Shift the selection weight of a transaction. The delta is kept even
    /// when the transaction is not currently pooled.
    pub fn prioritise(&self, txid: TxId, priority_delta: f64, fee_delta: Amount) {
        {
            let mut slot = self.deltas.entry(txid).or_insert((0.0, 0));
            slot.0 += priority_delta;
            slot.1 += fee_delta;
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        if !inner.entries.contains_key(&txid) {
            return;
        }
        let mut affected = inner.descendants_of(&txid);
        affected.insert(txid);
        for id in affected {
            if let Some(entry) = inner.entries.get(&id) {
                inner.by_ancestor_score.remove(&Inner::score_key(entry));
            }
            if let Some(entry) = inner.entries.get_mut(&id) {
                entry.ancestor_mod_fees += fee_delta;
                if id == txid {
                    entry.modified_fee += fee_delta;
                }
            }
            if let Some(entry) = inner.entries.get(&id) {
                inner.by_ancestor_score.insert(Inner::score_key(entry));
            }
        }
        debug!(tx = %txid, priority_delta, fee_delta, "Transaction prioritised");
    }

    /// The accumulated prioritisation delta of a transaction.
    pub fn delta(&self, txid: &TxId) -> (f64, Amount) {
        self.deltas.get(txid).map(|d| *d).unwrap_or((0.0, 0))
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, txid: &TxId) -> bool {
        self.inner.read().entries.contains_key(txid)
    }

    pub fn get(&self, txid: &TxId) -> Option<MempoolEntry> {
        self.inner.read().entries.get(txid).cloned()
    }

    /// A read-locked view for the duration of one template build.
    pub fn view(&self) -> MempoolView<'_> {
        MempoolView {
            guard: self.inner.read(),
            deltas: &self.deltas,
        }
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// A coherent read snapshot of the pool.
pub struct MempoolView<'a> {
    guard: RwLockReadGuard<'a, Inner>,
    deltas: &'a DashMap<TxId, (f64, Amount)>,
}

impl MempoolView<'_> {
    pub fn len(&self) -> usize {
        self.guard.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.entries.is_empty()
    }

    pub fn get(&self, txid: &TxId) -> Option<&MempoolEntry> {
        self.guard.entries.get(txid)
    }

    pub fn entries(&self) -> impl Iterator<Item = &MempoolEntry> {
        self.guard.entries.values()
    }

    /// Packages best-first by ancestor score.
    pub fn ancestor_score_order(&self) -> impl Iterator<Item = &AncestorScoreKey> {
        self.guard.by_ancestor_score.iter()
    }

    /// Unconfirmed ancestors of `txid`, excluding itself.
    pub fn ancestors_of(&self, txid: &TxId) -> BTreeSet<TxId> {
        self.guard.ancestors_of(txid)
    }

    /// Unconfirmed descendants of `txid`, excluding itself.
    pub fn descendants_of(&self, txid: &TxId) -> BTreeSet<TxId> {
        self.guard.descendants_of(txid)
    }

    /// Coin-age priority at `height` with the operator delta applied.
    pub fn priority_with_delta(&self, entry: &MempoolEntry, height: u32) -> f64 {
        let delta = self
            .deltas
            .get(&entry.txid())
            .map(|d| d.0)
            .unwrap_or(0.0);
        entry.priority(height) + delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platopia_consensus::{OutPoint, Script, TxIn, TxOut, COIN};

    fn tx_spending(prev: TxId, index: u32, value: Amount, outputs: usize) -> Arc<Transaction> {
        let per_out = value / outputs as Amount;
        Arc::new(Transaction::new(
            0,
            vec![TxIn::new(OutPoint::new(prev, index, value), Script::new())],
            (0..outputs)
                .map(|_| TxOut::new(per_out - 500, Script::new()))
                .collect(),
        ))
    }

    fn confirmed(n: u8) -> TxId {
        TxId([n; 32])
    }

    #[test]
    fn add_and_lookup() {
        let pool = Mempool::with_defaults();
        let tx = tx_spending(confirmed(1), 0, COIN, 1);
        let txid = tx.id();
        pool.add(tx, 500, 10, 0.0, COIN).unwrap();
        assert!(pool.contains(&txid));
        assert_eq!(pool.get(&txid).unwrap().fee, 500);
    }

    #[test]
    fn duplicates_rejected() {
        let pool = Mempool::with_defaults();
        let tx = tx_spending(confirmed(1), 0, COIN, 1);
        pool.add(tx.clone(), 500, 10, 0.0, COIN).unwrap();
        assert!(matches!(
            pool.add(tx, 500, 10, 0.0, COIN),
            Err(MempoolError::AlreadyExists(_))
        ));
    }

    #[test]
    fn ancestor_totals_accumulate() {
        let pool = Mempool::with_defaults();
        let parent = tx_spending(confirmed(1), 0, COIN, 2);
        let parent_id = parent.id();
        pool.add(parent.clone(), 1000, 10, 0.0, COIN).unwrap();

        let child = tx_spending(parent_id, 0, COIN / 2, 1);
        let child_id = child.id();
        pool.add(child.clone(), 2000, 10, 0.0, 0).unwrap();

        let grandchild = tx_spending(child_id, 0, COIN / 4, 1);
        let grandchild_id = grandchild.id();
        pool.add(grandchild.clone(), 4000, 10, 0.0, 0).unwrap();

        let entry = pool.get(&grandchild_id).unwrap();
        assert_eq!(entry.ancestor_count, 3);
        assert_eq!(entry.ancestor_mod_fees, 7000);
        assert_eq!(
            entry.ancestor_size,
            parent.serialized_size() + child.serialized_size() + grandchild.serialized_size()
        );

        let parent_entry = pool.get(&parent_id).unwrap();
        assert_eq!(parent_entry.descendant_count, 3);
        assert_eq!(parent_entry.children.len(), 1);
    }

    #[test]
    fn remove_for_block_fixes_descendants() {
        let pool = Mempool::with_defaults();
        let parent = tx_spending(confirmed(1), 0, COIN, 1);
        let parent_id = parent.id();
        pool.add(parent, 1000, 10, 0.0, COIN).unwrap();
        let child = tx_spending(parent_id, 0, COIN / 2, 1);
        let child_id = child.id();
        pool.add(child, 2000, 10, 0.0, 0).unwrap();

        pool.remove_for_block(&[parent_id]);
        assert!(!pool.contains(&parent_id));

        let entry = pool.get(&child_id).unwrap();
        assert_eq!(entry.ancestor_count, 1);
        assert_eq!(entry.ancestor_mod_fees, 2000);
        assert!(entry.parents.is_empty());
    }

    #[test]
    fn remove_subtree_takes_descendants() {
        let pool = Mempool::with_defaults();
        let parent = tx_spending(confirmed(1), 0, COIN, 1);
        let parent_id = parent.id();
        pool.add(parent, 1000, 10, 0.0, COIN).unwrap();
        let child = tx_spending(parent_id, 0, COIN / 2, 1);
        let child_id = child.id();
        pool.add(child, 2000, 10, 0.0, 0).unwrap();

        pool.remove_subtree(&parent_id).unwrap();
        assert!(pool.is_empty());
        let _ = child_id;
    }

    #[test]
    fn prioritise_shifts_package_scores() {
        let pool = Mempool::with_defaults();
        let parent = tx_spending(confirmed(1), 0, COIN, 1);
        let parent_id = parent.id();
        pool.add(parent, 1000, 10, 0.0, COIN).unwrap();
        let child = tx_spending(parent_id, 0, COIN / 2, 1);
        let child_id = child.id();
        pool.add(child, 2000, 10, 0.0, 0).unwrap();

        pool.prioritise(parent_id, 0.0, 5000);

        assert_eq!(pool.get(&parent_id).unwrap().modified_fee, 6000);
        assert_eq!(pool.get(&child_id).unwrap().ancestor_mod_fees, 8000);
        // The child's own modified fee is untouched.
        assert_eq!(pool.get(&child_id).unwrap().modified_fee, 2000);
    }

    #[test]
    fn delta_survives_removal() {
        let pool = Mempool::with_defaults();
        let tx = tx_spending(confirmed(1), 0, COIN, 1);
        let txid = tx.id();
        pool.prioritise(txid, 1.5, 700);
        pool.add(tx, 1000, 10, 0.0, COIN).unwrap();
        assert_eq!(pool.get(&txid).unwrap().modified_fee, 1700);
        assert_eq!(pool.delta(&txid), (1.5, 700));
    }

    #[test]
    fn eviction_drops_worst_package() {
        let pool = Mempool::new(MempoolConfig {
            max_transactions: 2,
        });
        for (n, fee) in [(1u8, 9000i64), (2, 8000)] {
            pool.add(tx_spending(confirmed(n), 0, COIN, 1), fee, 10, 0.0, COIN)
                .unwrap();
        }
        let cheap = tx_spending(confirmed(3), 0, COIN, 1);
        let cheap_id = cheap.id();
        pool.add(cheap, 10, 10, 0.0, COIN).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&cheap_id));
    }

    #[test]
    fn view_orders_by_ancestor_score() {
        let pool = Mempool::with_defaults();
        let low = tx_spending(confirmed(1), 0, COIN, 1);
        let high = tx_spending(confirmed(2), 0, COIN, 1);
        pool.add(low.clone(), 100, 10, 0.0, COIN).unwrap();
        pool.add(high.clone(), 9000, 10, 0.0, COIN).unwrap();

        let view = pool.view();
        let first = view.ancestor_score_order().next().unwrap();
        assert_eq!(first.txid, high.id());
    }
}

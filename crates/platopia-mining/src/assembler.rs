//! Block template assembly.
//!
//! `CreateNewBlock` selects a package of mempool transactions under the
//! size and sig-op limits in two phases: a coin-age priority fill over a
//! reserved slice of the block, then a greedy fill by ancestor fee rate.
//! Selecting a package pulls in its unconfirmed ancestors, so the
//! remaining descendants are re-scored in a builder-local modified set
//! rather than by touching the pool.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use tracing::{debug, info};

use platopia_consensus::{
    allow_free, max_block_sigops, next_work_required, Amount, Block, BlockHeader, ChainParams,
    ChainTip, ChainView, FeeRate, Script, Transaction, TxId, TxIn, TxOut, OutPoint,
    COINBASE_MATURITY, DEFAULT_BLOCK_MIN_TX_FEE, DEFAULT_BLOCK_PRIORITY_PERCENTAGE,
    DEFAULT_MAX_GENERATED_BLOCK_SIZE, MAX_BLOCK_SIZE, TX_FLAGS_COINBASE,
};
use platopia_mempool::{AncestorScoreKey, Mempool, MempoolEntry, MempoolView};

use crate::error::{MiningError, MiningResult};
use crate::traits::BlockValidator;

/// Give up on a nearly full block after this many package failures in a row.
const MAX_CONSECUTIVE_FAILURES: u32 = 1000;

static LAST_BLOCK_TX: AtomicU64 = AtomicU64::new(0);
static LAST_BLOCK_SIZE: AtomicU64 = AtomicU64::new(0);

/// Transaction count of the most recently assembled block.
pub fn last_block_tx() -> u64 {
    LAST_BLOCK_TX.load(AtomicOrdering::Relaxed)
}

/// Serialized size of the most recently assembled block.
pub fn last_block_size() -> u64 {
    LAST_BLOCK_SIZE.load(AtomicOrdering::Relaxed)
}

/// A candidate block with per-transaction fee and sig-op vectors.
/// Entry 0 covers the coinbase; its fee slot carries minus the total fees.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block: Block,
    pub tx_fees: Vec<Amount>,
    pub tx_sigops: Vec<u64>,
}

/// Template builder policy knobs.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Requested cap on generated block size; clamped to
    /// `[1000, MAX_BLOCK_SIZE - 1000]` at build time.
    pub max_generated_block_size: u64,
    /// Packages below this fee rate never enter the block.
    pub block_min_fee_rate: FeeRate,
    /// Percent of the block reserved for coin-age priority selection.
    pub block_priority_percentage: u8,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_generated_block_size: DEFAULT_MAX_GENERATED_BLOCK_SIZE,
            block_min_fee_rate: FeeRate::new(DEFAULT_BLOCK_MIN_TX_FEE),
            block_priority_percentage: DEFAULT_BLOCK_PRIORITY_PERCENTAGE,
        }
    }
}

/// Builds block templates against the current tip and mempool.
pub struct BlockAssembler<'a> {
    params: &'a ChainParams,
    config: AssemblerConfig,
    chain: &'a dyn ChainView,
    mempool: &'a Mempool,
    validator: &'a dyn BlockValidator,
}

/// Mutable bookkeeping of one `create_new_block` call.
struct BuildState {
    height: u32,
    lock_time_cutoff: i64,
    max_block_size: u64,

    in_block: HashSet<TxId>,
    selected: Vec<Arc<Transaction>>,
    tx_fees: Vec<Amount>,
    tx_sigops: Vec<u64>,

    block_size: u64,
    block_sigops: u64,
    block_tx: u64,
    fees: Amount,
    interest: Amount,

    last_few_txs: u32,
    block_finished: bool,
}

/// Package totals tracked in the modified set.
#[derive(Debug, Clone, Copy)]
struct PackageTotals {
    size: u64,
    mod_fees: Amount,
    sigops: u64,
}

/// Max-heap key of the priority phase.
struct PriorityKey {
    priority: f64,
    txid: TxId,
}

impl PartialEq for PriorityKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriorityKey {}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.txid.cmp(&self.txid))
    }
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> BlockAssembler<'a> {
    pub fn new(
        params: &'a ChainParams,
        config: AssemblerConfig,
        chain: &'a dyn ChainView,
        mempool: &'a Mempool,
        validator: &'a dyn BlockValidator,
    ) -> Self {
        Self {
            params,
            config,
            chain,
            mempool,
            validator,
        }
    }

    /// Assemble a new block paying out to `script_pubkey`.
    pub fn create_new_block(&self, script_pubkey: &Script) -> MiningResult<BlockTemplate> {
        // Tip snapshot before the mempool lock, in the global order.
        let tip = self.chain.tip();
        let height = tip.height + 1;
        let max_block_size = self
            .config
            .max_generated_block_size
            .clamp(1000, MAX_BLOCK_SIZE - 1000);

        let block_time = self.chain.adjusted_time();
        let mut state = BuildState {
            height,
            lock_time_cutoff: block_time as i64,
            max_block_size,
            in_block: HashSet::new(),
            selected: Vec::new(),
            tx_fees: Vec::new(),
            tx_sigops: Vec::new(),
            // Room reserved for the coinbase.
            block_size: 1000,
            block_sigops: 100,
            block_tx: 0,
            fees: 0,
            interest: 0,
            last_few_txs: 0,
            block_finished: false,
        };

        let view = self.mempool.view();
        self.add_priority_txs(&view, &mut state);
        let (packages_selected, descendants_updated) = self.add_package_txs(&view, &mut state);
        drop(view);

        LAST_BLOCK_TX.store(state.block_tx, AtomicOrdering::Relaxed);
        LAST_BLOCK_SIZE.store(state.block_size, AtomicOrdering::Relaxed);

        let subsidy = platopia_consensus::block_subsidy(height, &self.params.consensus);
        let coinbase_value = state.fees + subsidy;
        let coinbase = Transaction::new(
            TX_FLAGS_COINBASE,
            vec![TxIn::new(
                OutPoint {
                    hash: TxId::default(),
                    index: height,
                    value: coinbase_value,
                },
                Script::op_zero(),
            )],
            vec![TxOut {
                value: coinbase_value,
                principal: 0,
                script_pubkey: script_pubkey.clone(),
                content: String::new(),
                lock_time: COINBASE_MATURITY,
            }],
        );

        let mut tx_fees = vec![-state.fees];
        tx_fees.extend(state.tx_fees.iter());
        let mut tx_sigops = vec![coinbase.sigop_count()];
        tx_sigops.extend(state.tx_sigops.iter());

        let mut txs = Vec::with_capacity(state.selected.len() + 1);
        txs.push(coinbase);
        txs.extend(state.selected.iter().map(|tx| (**tx).clone()));

        let mut block = Block {
            header: BlockHeader {
                version: self.validator.compute_block_version(&tip),
                prev_hash: tip.hash,
                merkle_root: TxId::default(),
                height,
                time: block_time,
                chain_interest: tip.chain_interest + state.interest as u64,
                bits: 0,
                mix_hash: Default::default(),
                nonce: 0,
            },
            txs,
        };
        block.update_merkle_root();
        update_time(&mut block.header, &tip, self.chain, self.params);
        block.header.bits =
            next_work_required(&tip, block.header.time, self.chain, &self.params.consensus);

        info!(
            size = block.serialized_size(),
            txs = state.block_tx,
            fees = state.fees,
            sigops = state.block_sigops,
            packages = packages_selected,
            updated_descendants = descendants_updated,
            "CreateNewBlock"
        );

        self.validator
            .test_block_validity(&block, &tip)
            .map_err(MiningError::TemplateBuildFailed)?;

        Ok(BlockTemplate {
            block,
            tx_fees,
            tx_sigops,
        })
    }

    /// Whether the transaction still waits on a parent outside the block.
    fn is_still_dependent(entry: &MempoolEntry, state: &BuildState) -> bool {
        entry
            .parents
            .iter()
            .any(|parent| !state.in_block.contains(parent))
    }

    /// Size, sig-op and finality checks for a single transaction.
    fn test_for_block(&self, entry: &MempoolEntry, state: &mut BuildState) -> bool {
        let block_size_with_tx = state.block_size + entry.size;
        if block_size_with_tx >= state.max_block_size {
            if state.block_size > state.max_block_size - 100 || state.last_few_txs > 50 {
                state.block_finished = true;
                return false;
            }
            if state.block_size > state.max_block_size - 1000 {
                state.last_few_txs += 1;
            }
            return false;
        }

        let max_sigops = max_block_sigops(block_size_with_tx);
        if state.block_sigops + entry.sigop_count >= max_sigops {
            if state.block_sigops > max_sigops - 2 {
                state.block_finished = true;
            }
            return false;
        }

        self.validator
            .contextual_check_transaction(&entry.tx, state.height, state.lock_time_cutoff)
    }

    /// Package-level size and sig-op admission.
    fn test_package(&self, state: &BuildState, package_size: u64, package_sigops: u64) -> bool {
        let block_size_with_package = state.block_size + package_size;
        if block_size_with_package >= state.max_block_size {
            return false;
        }
        if state.block_sigops + package_sigops >= max_block_sigops(block_size_with_package) {
            return false;
        }
        true
    }

    /// Per-transaction finality and cumulative size over a package.
    fn test_package_transactions(
        &self,
        package: &[TxId],
        view: &MempoolView<'_>,
        state: &BuildState,
    ) -> bool {
        let mut potential_size = state.block_size;
        for txid in package {
            let entry = match view.get(txid) {
                Some(entry) => entry,
                None => return false,
            };
            if !self.validator.contextual_check_transaction(
                &entry.tx,
                state.height,
                state.lock_time_cutoff,
            ) {
                return false;
            }
            if potential_size + entry.size >= state.max_block_size {
                return false;
            }
            potential_size += entry.size;
        }
        true
    }

    fn add_to_block(&self, entry: &MempoolEntry, state: &mut BuildState) {
        state.selected.push(Arc::clone(&entry.tx));
        state.tx_fees.push(entry.fee);
        state.tx_sigops.push(entry.sigop_count);
        state.block_size += entry.size;
        state.block_tx += 1;
        state.block_sigops += entry.sigop_count;
        state.fees += entry.fee;
        state.interest += entry.interest;
        state.in_block.insert(entry.txid());
        debug!(tx = %entry.txid(), fee = entry.fee, "Added to block");
    }

    /// Phase 1: fill the reserved slice with coin-age priority entries.
    fn add_priority_txs(&self, view: &MempoolView<'_>, state: &mut BuildState) {
        if self.config.block_priority_percentage == 0 {
            return;
        }
        let priority_size =
            state.max_block_size * self.config.block_priority_percentage as u64 / 100;

        let mut heap: BinaryHeap<PriorityKey> = view
            .entries()
            .map(|entry| PriorityKey {
                priority: view.priority_with_delta(entry, state.height),
                txid: entry.txid(),
            })
            .collect();
        let mut wait_map: HashMap<TxId, f64> = HashMap::new();

        while let Some(top) = heap.pop() {
            if state.block_finished {
                break;
            }
            if state.in_block.contains(&top.txid) {
                continue;
            }
            let entry = match view.get(&top.txid) {
                Some(entry) => entry,
                None => continue,
            };

            if Self::is_still_dependent(entry, state) {
                wait_map.insert(top.txid, top.priority);
                continue;
            }

            if self.test_for_block(entry, state) {
                self.add_to_block(entry, state);

                if state.block_size >= priority_size || !allow_free(top.priority) {
                    break;
                }

                // Children may have become mineable; put any waiters back.
                for child in &entry.children {
                    if let Some(priority) = wait_map.remove(child) {
                        heap.push(PriorityKey {
                            priority,
                            txid: *child,
                        });
                    }
                }
            }
        }
    }

    /// Phase 2: fill the remainder by ancestor fee rate.
    ///
    /// Returns `(packages_selected, descendants_updated)`.
    fn add_package_txs(&self, view: &MempoolView<'_>, state: &mut BuildState) -> (u32, u32) {
        let mut modified: BTreeSet<AncestorScoreKey> = BTreeSet::new();
        let mut modified_totals: HashMap<TxId, PackageTotals> = HashMap::new();
        let mut failed: HashSet<TxId> = HashSet::new();
        let mut packages_selected = 0u32;
        let mut descendants_updated = 0u32;

        // Entries selected by the priority phase already shrink the
        // packages of their descendants.
        let seeded: Vec<TxId> = state.in_block.iter().copied().collect();
        descendants_updated +=
            self.update_packages_for_added(view, &seeded, state, &mut modified, &mut modified_totals);

        let order: Vec<AncestorScoreKey> = view.ancestor_score_order().cloned().collect();
        let mut mi = 0usize;
        let mut consecutive_failures = 0u32;

        loop {
            // Skip pool entries whose package state is stale or settled.
            while mi < order.len() {
                let txid = order[mi].txid;
                if modified_totals.contains_key(&txid)
                    || state.in_block.contains(&txid)
                    || failed.contains(&txid)
                {
                    mi += 1;
                } else {
                    break;
                }
            }

            let modified_head = modified.iter().next().cloned();
            let (txid, using_modified) = if mi >= order.len() {
                match &modified_head {
                    Some(key) => (key.txid, true),
                    None => break,
                }
            } else {
                match &modified_head {
                    // The modified head outranks the next pool entry.
                    Some(key) if key < &order[mi] => (key.txid, true),
                    _ => {
                        let txid = order[mi].txid;
                        mi += 1;
                        (txid, false)
                    }
                }
            };
            debug_assert!(!state.in_block.contains(&txid));

            let entry = match view.get(&txid) {
                Some(entry) => entry,
                None => break,
            };
            let (package_size, package_fees, package_sigops) = if using_modified {
                let totals = modified_totals[&txid];
                (totals.size, totals.mod_fees, totals.sigops)
            } else {
                (
                    entry.ancestor_size,
                    entry.ancestor_mod_fees,
                    entry.ancestor_sigops,
                )
            };

            if package_fees < self.config.block_min_fee_rate.fee_for(package_size) {
                // Everything after this point pays a worse rate.
                return (packages_selected, descendants_updated);
            }

            if !self.test_package(state, package_size, package_sigops) {
                if using_modified {
                    let key = modified_head.expect("modified candidate");
                    modified.remove(&key);
                    modified_totals.remove(&txid);
                    failed.insert(txid);
                }
                consecutive_failures += 1;
                if consecutive_failures > MAX_CONSECUTIVE_FAILURES
                    && state.block_size > state.max_block_size - 1000
                {
                    // Close to full and nothing fits any more.
                    break;
                }
                continue;
            }

            let mut package: Vec<TxId> = view
                .ancestors_of(&txid)
                .into_iter()
                .filter(|id| !state.in_block.contains(id))
                .collect();
            package.push(txid);

            if !self.test_package_transactions(&package, view, state) {
                if using_modified {
                    let key = modified_head.expect("modified candidate");
                    modified.remove(&key);
                    modified_totals.remove(&txid);
                    failed.insert(txid);
                }
                continue;
            }
            consecutive_failures = 0;

            // A parent's ancestor count is strictly smaller than any of
            // its descendants', so this order is a valid topology.
            package.sort_by(|a, b| {
                let count_a = view.get(a).map(|e| e.ancestor_count).unwrap_or(0);
                let count_b = view.get(b).map(|e| e.ancestor_count).unwrap_or(0);
                count_a.cmp(&count_b).then_with(|| a.cmp(b))
            });

            for id in &package {
                let member = view.get(id).expect("package member pooled");
                self.add_to_block(member, state);
                if let Some(totals) = modified_totals.remove(id) {
                    modified.remove(&AncestorScoreKey::new(totals.mod_fees, totals.size, *id));
                }
            }
            packages_selected += 1;

            descendants_updated += self.update_packages_for_added(
                view,
                &package,
                state,
                &mut modified,
                &mut modified_totals,
            );
        }

        (packages_selected, descendants_updated)
    }

    /// Shrink the recorded package totals of every descendant of the
    /// newly added transactions.
    fn update_packages_for_added(
        &self,
        view: &MempoolView<'_>,
        added: &[TxId],
        state: &BuildState,
        modified: &mut BTreeSet<AncestorScoreKey>,
        modified_totals: &mut HashMap<TxId, PackageTotals>,
    ) -> u32 {
        let added_set: HashSet<&TxId> = added.iter().collect();
        let mut updated = 0u32;
        for txid in added {
            let added_entry = match view.get(txid) {
                Some(entry) => entry,
                None => continue,
            };
            for desc_id in view.descendants_of(txid) {
                if added_set.contains(&desc_id) || state.in_block.contains(&desc_id) {
                    continue;
                }
                let desc = match view.get(&desc_id) {
                    Some(entry) => entry,
                    None => continue,
                };
                updated += 1;
                let totals = modified_totals.entry(desc_id).or_insert_with(|| {
                    PackageTotals {
                        size: desc.ancestor_size,
                        mod_fees: desc.ancestor_mod_fees,
                        sigops: desc.ancestor_sigops,
                    }
                });
                modified.remove(&AncestorScoreKey::new(totals.mod_fees, totals.size, desc_id));
                totals.size -= added_entry.size;
                totals.mod_fees -= added_entry.modified_fee;
                totals.sigops -= added_entry.sigop_count;
                modified.insert(AncestorScoreKey::new(totals.mod_fees, totals.size, desc_id));
            }
        }
        updated
    }
}

/// Bump the header time to at least one past the tip's median, following
/// the adjusted clock. On networks that allow min-difficulty blocks this
/// can change the work required.
pub fn update_time(
    header: &mut BlockHeader,
    tip: &ChainTip,
    chain: &dyn ChainView,
    params: &ChainParams,
) -> i64 {
    let old_time = header.time;
    let new_time = (tip.median_time_past + 1).max(chain.adjusted_time());
    if old_time < new_time {
        header.time = new_time;
    }
    if params.consensus.allow_min_difficulty_blocks {
        header.bits = next_work_required(tip, header.time, chain, &params.consensus);
    }
    new_time as i64 - old_time as i64
}

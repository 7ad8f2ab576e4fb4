//! The work registry.
//!
//! A work entry is one candidate block being mined. Its identity is the
//! Ethash seal input of the base header. Workers flip the atomic flags on
//! the hot path; the registry mutex only guards list shape. An entry is
//! only ever removed after its `mining_threads` counter has drained.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use platopia_consensus::{Block, EthHash};

/// One candidate block under active mining.
pub struct WorkEntry {
    block: Mutex<Block>,
    pub block_ethash: EthHash,
    pub boundary: EthHash,
    pub height: u32,
    done: AtomicBool,
    deprecated: AtomicBool,
    mining_threads: AtomicU32,
}

impl WorkEntry {
    pub fn new(block: Block, boundary: EthHash) -> Self {
        let block_ethash = block.header.ethash();
        let height = block.header.height;
        Self {
            block: Mutex::new(block),
            block_ethash,
            boundary,
            height,
            done: AtomicBool::new(false),
            deprecated: AtomicBool::new(false),
            mining_threads: AtomicU32::new(0),
        }
    }

    /// Install a solution. The block mutex serializes racing winners and
    /// the `done` store publishes the seal fields: an observer that sees
    /// `done` reads a coherent nonce and mix hash.
    pub fn try_complete(&self, nonce: u64, mix_hash: EthHash) -> bool {
        let mut block = self.block.lock();
        if self.done.load(Ordering::Acquire) {
            return false;
        }
        block.header.nonce = nonce;
        block.header.mix_hash = mix_hash;
        self.done.store(true, Ordering::Release);
        true
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn deprecate(&self) {
        self.deprecated.store(true, Ordering::Release);
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated.load(Ordering::Acquire)
    }

    pub fn inc_threads(&self) {
        self.mining_threads.fetch_add(1, Ordering::AcqRel);
    }

    pub fn dec_threads(&self) {
        self.mining_threads.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn threads(&self) -> u32 {
        self.mining_threads.load(Ordering::Acquire)
    }

    /// A copy of the candidate block, including any installed solution.
    pub fn block(&self) -> Block {
        self.block.lock().clone()
    }
}

/// The live set of work entries.
#[derive(Default)]
pub struct WorkRegistry {
    works: Mutex<Vec<Arc<WorkEntry>>>,
}

impl WorkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate. An entry with the same seal input already in
    /// the list is returned instead: one live entry per `block_ethash`.
    pub fn add(&self, block: Block, boundary: EthHash) -> Arc<WorkEntry> {
        let mut works = self.works.lock();
        let block_ethash = block.header.ethash();
        if let Some(existing) = works
            .iter()
            .find(|w| w.block_ethash == block_ethash && w.boundary == boundary)
        {
            return Arc::clone(existing);
        }
        info!(work = %block_ethash, height = block.header.height, "Add a new work");
        let entry = Arc::new(WorkEntry::new(block, boundary));
        works.push(Arc::clone(&entry));
        entry
    }

    /// The first entry still worth mining.
    pub fn get_any(&self) -> Option<Arc<WorkEntry>> {
        self.works
            .lock()
            .iter()
            .find(|w| !w.is_done() && !w.is_deprecated())
            .cloned()
    }

    /// Look up by seal input.
    pub fn get(&self, block_ethash: &EthHash) -> Option<Arc<WorkEntry>> {
        self.works
            .lock()
            .iter()
            .find(|w| w.block_ethash == *block_ethash)
            .cloned()
    }

    pub fn remove(&self, block_ethash: &EthHash) {
        debug!(work = %block_ethash, "RemoveWork");
        self.works.lock().retain(|w| w.block_ethash != *block_ethash);
    }

    pub fn remove_height(&self, height: u32) {
        debug!(height, "RemoveWork by height");
        self.works.lock().retain(|w| w.height != height);
    }

    pub fn clear(&self) {
        self.works.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.works.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.works.lock().is_empty()
    }

    /// Dump the list to the log.
    pub fn log_list(&self) {
        for (i, work) in self.works.lock().iter().enumerate() {
            info!(
                index = i,
                work = %work.block_ethash,
                height = work.height,
                done = work.is_done(),
                deprecated = work.is_deprecated(),
                "Work entry"
            );
        }
    }
}

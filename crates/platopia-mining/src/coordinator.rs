//! The mining coordinator.
//!
//! Owns the worker thread pool, the work dispatcher and the DAG
//! pre-generator. The dispatcher repeatedly asks the template builder for
//! a candidate, registers it, and watches it until the tip advances past
//! it or a worker solves it. Workers pick any live entry, pull the full
//! DAG for its epoch and scan nonces from a random 64-bit start.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tracing::{debug, error, info, warn};

use platopia_consensus::{
    boundary_from_compact, Block, BlockHash, ChainParams, ChainView, EthHash, Script,
};
use platopia_mempool::Mempool;

use crate::assembler::{AssemblerConfig, BlockAssembler};
use crate::dag::DagCache;
use crate::error::MiningResult;
use crate::ethash::{quick_check_difficulty, EPOCH_LENGTH};
use crate::submit::process_block_found;
use crate::traits::{BlockProcessor, BlockValidator, ReserveScript, WalletMiningHooks};
use crate::work::{WorkEntry, WorkRegistry};

/// Dispatcher and worker poll interval.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// DAG pre-generator check interval.
const DAG_CHECK_INTERVAL_SECS: u64 = 10;

/// Hashrate estimate refresh interval per worker.
const HASHRATE_WINDOW: Duration = Duration::from_secs(4);

/// Hashmeter log interval.
const HASHMETER_LOG_SECS: u64 = 30;

/// Pre-generate the next epoch's DAG this deep into the current epoch.
const NEXT_EPOCH_LEAD: u64 = 20_000;

/// Miner configuration.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Worker thread count; negative selects the network default or the
    /// hardware concurrency.
    pub threads: i32,
    /// Template builder policy.
    pub assembler: AssemblerConfig,
    /// Run the background DAG pre-generator.
    pub pregenerate_dag: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: -1,
            assembler: AssemblerConfig::default(),
            pregenerate_dag: true,
        }
    }
}

struct NewWork {
    block: Block,
    boundary: EthHash,
}

/// The mining engine.
pub struct MiningCoordinator {
    params: Arc<ChainParams>,
    chain: Arc<dyn ChainView>,
    mempool: Arc<Mempool>,
    validator: Arc<dyn BlockValidator>,
    processor: Arc<dyn BlockProcessor>,
    wallet: Arc<dyn WalletMiningHooks>,

    config: RwLock<MinerConfig>,
    dag: Arc<DagCache>,
    works: WorkRegistry,

    generate: AtomicBool,
    resolved_threads: AtomicU32,
    hashes_per_sec: Mutex<f64>,
    coinbase_script: RwLock<Script>,
    extra_nonce: Mutex<(BlockHash, u32)>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl MiningCoordinator {
    pub fn new(
        params: Arc<ChainParams>,
        chain: Arc<dyn ChainView>,
        mempool: Arc<Mempool>,
        validator: Arc<dyn BlockValidator>,
        processor: Arc<dyn BlockProcessor>,
        wallet: Arc<dyn WalletMiningHooks>,
        config: MinerConfig,
    ) -> Self {
        Self {
            params,
            chain,
            mempool,
            validator,
            processor,
            wallet,
            config: RwLock::new(config),
            dag: Arc::new(DagCache::default()),
            works: WorkRegistry::new(),
            generate: AtomicBool::new(false),
            resolved_threads: AtomicU32::new(0),
            hashes_per_sec: Mutex::new(0.0),
            coinbase_script: RwLock::new(Script::new()),
            extra_nonce: Mutex::new((BlockHash::default(), 0)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// The standing coinbase script the background dispatcher mines to.
    pub fn set_coinbase_script(&self, script: Script) {
        *self.coinbase_script.write() = script;
    }

    pub fn threads(&self) -> i32 {
        self.config.read().threads
    }

    pub fn set_threads(&self, threads: i32) {
        self.config.write().threads = threads;
    }

    pub fn is_generating(&self) -> bool {
        self.generate.load(Ordering::Acquire)
    }

    pub fn dag(&self) -> &Arc<DagCache> {
        &self.dag
    }

    pub fn works(&self) -> &WorkRegistry {
        &self.works
    }

    /// Launch the DAG pre-generator, the dispatcher and the worker pool.
    pub fn start(self: &Arc<Self>) {
        self.works.clear();
        self.pool_start(0);
        if !self.is_generating() {
            return;
        }

        if self.config.read().pregenerate_dag {
            self.spawn_named("dag-generator", |this| this.dag_generator_loop());
        }
        self.spawn_named("work-dispatcher", |this| this.dispatcher_loop());
    }

    /// Signal shutdown, join every thread, drop all work and DAG handles.
    pub fn stop(&self) {
        info!("Miner pool stop");
        self.wind_down();
        self.dag.shutdown();
    }

    fn wind_down(&self) {
        self.generate.store(false, Ordering::Release);
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.join();
        }
        self.works.clear();
        *self.hashes_per_sec.lock() = 0.0;
    }

    /// Mine synchronously until `n_generate` blocks were accepted or a
    /// worker exhausts `max_tries` nonces per attempt.
    pub fn mine_blocks(
        self: &Arc<Self>,
        reserve: Arc<dyn ReserveScript>,
        n_generate: u32,
        max_tries: u64,
        keep_script: bool,
    ) -> Vec<BlockHash> {
        self.works.clear();
        self.pool_start(max_tries);
        if !self.is_generating() {
            return Vec::new();
        }
        if self.config.read().pregenerate_dag {
            self.spawn_named("dag-generator", |this| this.dag_generator_loop());
        }

        let hashes = self.dispatch_single(reserve, n_generate, keep_script);

        // Workers stop; the DAG stays cached for the next call.
        self.wind_down();
        hashes
    }

    /// The freshest live work entry for pool miners, building one when
    /// the registry is empty or everything in it went stale.
    pub fn get_work(&self, reserve: &Arc<dyn ReserveScript>) -> MiningResult<Arc<WorkEntry>> {
        self.get_last_new_work(reserve, true)
    }

    pub fn get_last_new_work(
        &self,
        reserve: &Arc<dyn ReserveScript>,
        prune: bool,
    ) -> MiningResult<Arc<WorkEntry>> {
        let mut entry = match self.works.get_any() {
            Some(entry) => entry,
            None => {
                let work = self.gen_new_work(&reserve.script())?;
                self.works.add(work.block, work.boundary)
            }
        };

        if prune {
            while entry.height <= self.chain.tip().height {
                self.works.remove_height(entry.height);
                entry = match self.works.get_any() {
                    Some(entry) => entry,
                    None => {
                        let work = self.gen_new_work(&reserve.script())?;
                        self.works.add(work.block, work.boundary)
                    }
                };
            }
        }

        self.works.log_list();
        Ok(entry)
    }

    /// Install an externally mined solution and submit the block.
    pub fn submit_work(&self, block_ethash: EthHash, nonce: u64, mix_hash: EthHash) -> bool {
        let entry = match self.works.get(&block_ethash) {
            Some(entry) => entry,
            None => {
                warn!(work = %block_ethash, "No such work");
                return false;
            }
        };
        entry.try_complete(nonce, mix_hash);

        let block = entry.block();
        match process_block_found(&block, &*self.chain, &*self.processor, &*self.wallet) {
            Ok(()) => true,
            Err(err) => {
                warn!(work = %block_ethash, %err, "Submitted work rejected");
                self.works.remove(&entry.block_ethash);
                false
            }
        }
    }

    /// Record a hashrate estimate, ours or a pool miner's.
    pub fn set_hash_rate(&self, rate: f64) {
        *self.hashes_per_sec.lock() = rate;
    }

    /// Aggregate hashrate estimate across the pool.
    pub fn hash_rate(&self) -> f64 {
        let per_thread = *self.hashes_per_sec.lock();
        let threads = self.resolved_threads.load(Ordering::Relaxed);
        if threads <= 1 {
            per_thread
        } else {
            per_thread * threads as f64
        }
    }

    fn pool_start(self: &Arc<Self>, max_tries: u64) {
        self.generate.store(true, Ordering::Release);

        let mut threads = self.config.read().threads;
        if threads < 0 {
            threads = self
                .params
                .default_miner_threads
                .map(|t| t as i32)
                .unwrap_or_else(|| num_cpus::get() as i32);
        }
        if threads == 0 {
            self.generate.store(false, Ordering::Release);
            info!("Miner pool not started, zero threads configured");
            return;
        }
        self.resolved_threads.store(threads as u32, Ordering::Relaxed);
        *self.hashes_per_sec.lock() = 0.0;
        info!(threads, "Miner pool start");

        for i in 0..threads {
            self.spawn_named(&format!("platopia-miner-{i}"), move |this| {
                this.worker_loop(max_tries)
            });
        }
    }

    fn spawn_named<F>(self: &Arc<Self>, name: &str, body: F)
    where
        F: FnOnce(Arc<Self>) + Send + 'static,
    {
        let this = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(this))
            .expect("spawn mining thread");
        self.handles.lock().push(handle);
    }

    /// Build a fresh candidate and derive its boundary.
    fn gen_new_work(&self, script: &Script) -> MiningResult<NewWork> {
        let config = self.config.read().assembler.clone();
        let assembler = BlockAssembler::new(
            &self.params,
            config,
            &*self.chain,
            &self.mempool,
            &*self.validator,
        );
        let mut template = assembler.create_new_block(script)?;
        self.increment_extra_nonce(&mut template.block);
        let boundary = boundary_from_compact(template.block.header.bits)?;
        Ok(NewWork {
            block: template.block,
            boundary,
        })
    }

    /// Advance the per-parent extra nonce and refresh the Merkle root so
    /// repeated polls against one tip stay distinguishable.
    fn increment_extra_nonce(&self, block: &mut Block) {
        let mut guard = self.extra_nonce.lock();
        if guard.0 != block.header.prev_hash {
            guard.1 = 0;
            guard.0 = block.header.prev_hash;
        }
        guard.1 += 1;
        block.update_merkle_root();
    }

    /// Background dispatcher: one candidate at a time, deprecated when
    /// the chain passes it, submitted when a worker solves it.
    fn dispatcher_loop(self: Arc<Self>) {
        let mut last_meter = Instant::now();
        while self.is_generating() {
            let script = self.coinbase_script.read().clone();
            let entry = match self.gen_new_work(&script) {
                Ok(work) => self.works.add(work.block, work.boundary),
                Err(err) => {
                    // Recoverable: retry against the next tip.
                    error!(%err, "Dispatcher could not build work");
                    thread::sleep(POLL_INTERVAL);
                    continue;
                }
            };

            while self.is_generating() {
                if self.chain.tip().height >= entry.height {
                    entry.deprecate();
                    debug!(work = %entry.block_ethash, "Work deprecated by tip advance");
                    while entry.threads() != 0 {
                        thread::sleep(POLL_INTERVAL);
                    }
                    self.works.remove(&entry.block_ethash);
                    break;
                }

                if entry.is_done() {
                    let block = entry.block();
                    if let Err(err) = process_block_found(
                        &block,
                        &*self.chain,
                        &*self.processor,
                        &*self.wallet,
                    ) {
                        warn!(%err, "Solved work not accepted");
                    }
                    while entry.threads() != 0 {
                        thread::sleep(POLL_INTERVAL);
                    }
                    self.works.remove(&entry.block_ethash);
                    break;
                }

                if last_meter.elapsed().as_secs() >= HASHMETER_LOG_SECS {
                    last_meter = Instant::now();
                    info!(khash_per_sec = self.hash_rate() / 1000.0, "hashmeter");
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }

    /// Synchronous dispatcher used by `mine_blocks`: waits for each
    /// solution and hands it off before building the next candidate.
    fn dispatch_single(
        self: &Arc<Self>,
        reserve: Arc<dyn ReserveScript>,
        mut remaining: u32,
        keep_script: bool,
    ) -> Vec<BlockHash> {
        info!(blocks = remaining, "dispatch_single");
        let mut hashes = Vec::new();
        let mut last_meter = Instant::now();

        while self.is_generating() && remaining > 0 {
            self.works.clear();
            let work = match self.gen_new_work(&reserve.script()) {
                Ok(work) => work,
                Err(err) => {
                    error!(%err, "mine_blocks could not build work");
                    break;
                }
            };
            let entry = self.works.add(work.block, work.boundary);

            while self.is_generating() && remaining > 0 {
                if entry.is_done() {
                    let block = entry.block();
                    if process_block_found(&block, &*self.chain, &*self.processor, &*self.wallet)
                        .is_ok()
                    {
                        hashes.push(block.hash());
                        self.works.remove(&entry.block_ethash);
                        remaining -= 1;
                        if keep_script {
                            reserve.keep();
                        }
                    }
                    break;
                }

                if last_meter.elapsed().as_secs() >= HASHMETER_LOG_SECS {
                    last_meter = Instant::now();
                    info!(khash_per_sec = self.hash_rate() / 1000.0, "hashmeter");
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
        hashes
    }

    /// Worker: pick live work, acquire its DAG, scan nonces.
    fn worker_loop(self: Arc<Self>, max_tries: u64) {
        while self.is_generating() {
            let work = match self.works.get_any() {
                Some(work) if !work.is_done() && !work.is_deprecated() => work,
                _ => {
                    thread::sleep(POLL_INTERVAL);
                    continue;
                }
            };

            work.inc_threads();
            debug!(work = %work.block_ethash, "Work on");
            self.mine(&work, max_tries);
            work.dec_threads();
        }
        debug!("Worker shutting down");
    }

    /// One mining attempt on one entry. Returns once solved, deprecated,
    /// out of tries or shut down.
    fn mine(&self, work: &WorkEntry, max_tries: u64) -> bool {
        // The full DAG may still be generating; poll while staying
        // responsive to shutdown and work-state changes.
        let full = loop {
            if !self.is_generating() || work.is_done() || work.is_deprecated() {
                return false;
            }
            match self.dag.get_full(work.height) {
                Some(full) => break full,
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let mut nonce: u64 = rand::thread_rng().gen();
        let mut tries: u64 = 0;
        let mut hash_count: u64 = 0;
        let mut window_start = Instant::now();

        while self.is_generating() && !work.is_done() && !work.is_deprecated() {
            let (mix_hash, _result) = full.compute(&work.block_ethash, nonce);
            if quick_check_difficulty(&work.block_ethash, nonce, &mix_hash, &work.boundary) {
                info!(
                    work = %work.block_ethash,
                    target = %work.boundary,
                    nonce,
                    mix = %mix_hash,
                    "proof-of-work found"
                );
                return work.try_complete(nonce, mix_hash);
            }

            hash_count += 1;
            nonce = nonce.wrapping_add(1);

            if max_tries != 0 {
                tries += 1;
                if tries > max_tries {
                    break;
                }
            }

            let elapsed = window_start.elapsed();
            if elapsed >= HASHRATE_WINDOW {
                self.set_hash_rate(hash_count as f64 / elapsed.as_secs_f64());
                window_start = Instant::now();
                hash_count = 0;
            }
        }
        false
    }

    /// Keep the DAG cache filled for the current epoch, and for the next
    /// one once the chain is close to the boundary.
    fn dag_generator_loop(self: Arc<Self>) {
        while self.is_generating() {
            let height = self.chain.tip().height;
            if self.dag.get_full(height).is_none() {
                self.dag.ensure_full(height);
            }
            if height as u64 % EPOCH_LENGTH > NEXT_EPOCH_LEAD {
                self.dag.ensure_full(height + EPOCH_LENGTH as u32);
            }

            for _ in 0..DAG_CHECK_INTERVAL_SECS {
                if !self.is_generating() {
                    return;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

impl Drop for MiningCoordinator {
    fn drop(&mut self) {
        self.generate.store(false, Ordering::Release);
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.join();
        }
        self.dag.shutdown();
    }
}

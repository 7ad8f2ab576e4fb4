//! Regtest harness.
//!
//! An in-memory regtest node: header chain, mempool and mining
//! coordinator wired to harness implementations of the validation
//! collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use platopia_api::{AppState, DepositOutput, DepositView, NullDeposits};
use platopia_consensus::{
    boundary_from_compact, Amount, Block, ChainParams, ChainTip, ChainView, HeaderChain, Network,
    OutPoint, Script, Transaction, TxId, TxIn, TxOut,
};
use platopia_mempool::Mempool;
use platopia_mining::ethash::quick_check_difficulty;
use platopia_mining::{
    BlockProcessor, BlockValidator, MinerConfig, MiningCoordinator, NullWalletHooks,
    ReserveScript, StaticScript,
};

/// A p2pkh script usable as a coinbase destination.
pub const TEST_SCRIPT_HEX: &str = "76a914ab9eb67a1bc20e8f138523dffc88586f2f31e94188ac";

/// Permissive template validation: linkage only.
pub struct HarnessValidator;

impl BlockValidator for HarnessValidator {
    fn test_block_validity(&self, block: &Block, tip: &ChainTip) -> Result<(), String> {
        if block.header.prev_hash != tip.hash {
            return Err("tip moved during build".to_string());
        }
        Ok(())
    }

    fn contextual_check_transaction(
        &self,
        tx: &Transaction,
        _height: u32,
        _lock_time_cutoff: i64,
    ) -> bool {
        !tx.is_coinbase()
    }
}

/// Connects accepted blocks to the harness chain; optionally verifies
/// the Ethash seal first, like real validation would.
pub struct HarnessProcessor {
    chain: Arc<HeaderChain>,
    mempool: Arc<Mempool>,
    check_pow: bool,
    accepted: AtomicUsize,
}

impl HarnessProcessor {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl BlockProcessor for HarnessProcessor {
    fn process_new_block(&self, block: &Block) -> bool {
        if self.check_pow {
            let boundary = match boundary_from_compact(block.header.bits) {
                Ok(boundary) => boundary,
                Err(_) => return false,
            };
            if !quick_check_difficulty(
                &block.header.ethash(),
                block.header.nonce,
                &block.header.mix_hash,
                &boundary,
            ) {
                return false;
            }
        }
        if self.chain.connect(block).is_err() {
            return false;
        }
        let confirmed: Vec<TxId> = block.txs.iter().skip(1).map(|tx| tx.id()).collect();
        self.mempool.remove_for_block(&confirmed);
        self.accepted.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// One in-memory regtest node.
pub struct RegtestNode {
    pub params: Arc<ChainParams>,
    pub chain: Arc<HeaderChain>,
    pub mempool: Arc<Mempool>,
    pub processor: Arc<HarnessProcessor>,
    pub coordinator: Arc<MiningCoordinator>,
}

impl RegtestNode {
    /// Node with the default harness miner config: one worker, no DAG
    /// pre-generation, Ethash seal not enforced.
    pub fn new() -> Self {
        Self::with_config(
            MinerConfig {
                threads: 1,
                pregenerate_dag: false,
                ..Default::default()
            },
            false,
        )
    }

    pub fn with_config(config: MinerConfig, check_pow: bool) -> Self {
        let params = ChainParams::for_network(Network::Regtest);
        let chain = Arc::new(HeaderChain::new(
            params.genesis_block(),
            params.consensus.total_interest,
        ));
        let mempool = Arc::new(Mempool::with_defaults());
        let processor = Arc::new(HarnessProcessor {
            chain: Arc::clone(&chain),
            mempool: Arc::clone(&mempool),
            check_pow,
            accepted: AtomicUsize::new(0),
        });
        let coordinator = Arc::new(MiningCoordinator::new(
            Arc::clone(&params),
            chain.clone() as Arc<dyn ChainView>,
            Arc::clone(&mempool),
            Arc::new(HarnessValidator),
            processor.clone() as Arc<dyn BlockProcessor>,
            Arc::new(NullWalletHooks),
            config,
        ));
        Self {
            params,
            chain,
            mempool,
            processor,
            coordinator,
        }
    }

    pub fn test_script(&self) -> Script {
        Script::from_hex(TEST_SCRIPT_HEX).expect("valid test script")
    }

    pub fn reserve(&self) -> Arc<dyn ReserveScript> {
        Arc::new(StaticScript(self.test_script()))
    }

    /// App state over this node, for exercising API handlers directly.
    pub fn app_state(&self) -> AppState {
        AppState {
            params: Arc::clone(&self.params),
            chain: self.chain.clone() as Arc<dyn ChainView>,
            mempool: Arc::clone(&self.mempool),
            coordinator: Arc::clone(&self.coordinator),
            script_provider: Arc::new(StaticScript(self.test_script())),
            deposits: Arc::new(NullDeposits),
        }
    }

    /// App state with a fixed deposit list.
    pub fn app_state_with_deposits(&self, deposits: Vec<DepositOutput>) -> AppState {
        struct FixedDeposits(Vec<DepositOutput>);
        impl DepositView for FixedDeposits {
            fn all_deposits(&self) -> Vec<DepositOutput> {
                self.0.clone()
            }
        }
        AppState {
            deposits: Arc::new(FixedDeposits(deposits)),
            ..self.app_state()
        }
    }
}

impl Default for RegtestNode {
    fn default() -> Self {
        Self::new()
    }
}

/// A transaction spending one outpoint into one output.
pub fn spend(prev: TxId, index: u32, value: Amount, fee: Amount) -> Arc<Transaction> {
    Arc::new(Transaction::new(
        0,
        vec![TxIn::new(OutPoint::new(prev, index, value), Script::new())],
        vec![TxOut::new(value - fee, Script::new())],
    ))
}

/// A transaction with several outputs, for fan-out parents.
pub fn spend_fanout(prev: TxId, value: Amount, fee: Amount, outputs: u32) -> Arc<Transaction> {
    let per_out = (value - fee) / outputs as Amount;
    Arc::new(Transaction::new(
        0,
        vec![TxIn::new(OutPoint::new(prev, 0, value), Script::new())],
        (0..outputs)
            .map(|_| TxOut::new(per_out, Script::new()))
            .collect(),
    ))
}

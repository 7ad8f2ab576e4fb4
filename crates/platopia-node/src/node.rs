//! Node wiring.
//!
//! Hooks the in-memory header chain, the mempool, the mining coordinator
//! and the API server together. The block processor here covers exactly
//! what the mining core needs from its validation collaborator: linkage,
//! Merkle consistency, proof-of-work and the mempool sweep.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use platopia_api::{AppState, NullDeposits};
use platopia_consensus::{
    block_merkle_root, boundary_from_compact, select_params, Block, ChainParams, ChainTip,
    ChainView, FeeRate, HeaderChain, Script, Transaction, TxId,
};
use platopia_mempool::Mempool;
use platopia_mining::ethash::quick_check_difficulty;
use platopia_mining::{
    AssemblerConfig, BlockProcessor, BlockValidator, MinerConfig, MiningCoordinator,
    NullWalletHooks, StaticScript,
};

use crate::config::NodeConfig;

/// Template-side validation hooks.
pub struct NodeValidator;

impl BlockValidator for NodeValidator {
    fn test_block_validity(&self, block: &Block, tip: &ChainTip) -> Result<(), String> {
        if block.header.prev_hash != tip.hash {
            return Err("does not build on the current tip".to_string());
        }
        if block.txs.is_empty() || !block.txs[0].is_coinbase() {
            return Err("first transaction is not a coinbase".to_string());
        }
        if block.header.merkle_root != block_merkle_root(&block.txs) {
            return Err("merkle root mismatch".to_string());
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

/// Accepts blocks into the header chain after checking their seal.
pub struct NodeProcessor {
    chain: Arc<HeaderChain>,
    mempool: Arc<Mempool>,
}

impl BlockProcessor for NodeProcessor {
    fn process_new_block(&self, block: &Block) -> bool {
        let boundary = match boundary_from_compact(block.header.bits) {
            Ok(boundary) => boundary,
            Err(err) => {
                warn!(%err, "Rejected block with invalid bits");
                return false;
            }
        };
        if !quick_check_difficulty(
            &block.header.ethash(),
            block.header.nonce,
            &block.header.mix_hash,
            &boundary,
        ) {
            warn!(block = %block.hash(), "Rejected block failing proof-of-work");
            return false;
        }
        if let Err(err) = self.chain.connect(block) {
            warn!(block = %block.hash(), %err, "Rejected block");
            return false;
        }
        let confirmed: Vec<TxId> = block.txs.iter().skip(1).map(|tx| tx.id()).collect();
        self.mempool.remove_for_block(&confirmed);
        info!(block = %block.hash(), height = block.header.height, "Connected block");
        true
    }
}

/// A running node.
pub struct Node {
    pub params: Arc<ChainParams>,
    pub chain: Arc<HeaderChain>,
    pub mempool: Arc<Mempool>,
    pub coordinator: Arc<MiningCoordinator>,
    config: NodeConfig,
}

impl Node {
    pub fn new(config: NodeConfig) -> Result<Self> {
        let params = select_params(&config.network)?;
        let chain = Arc::new(HeaderChain::new(
            params.genesis_block(),
            params.consensus.total_interest,
        ));
        let mempool = Arc::new(Mempool::with_defaults());

        let miner_config = MinerConfig {
            threads: config.mining.threads,
            assembler: AssemblerConfig {
                max_generated_block_size: config.mining.block_max_size,
                block_min_fee_rate: FeeRate::new(config.mining.block_min_tx_fee),
                block_priority_percentage: config.mining.block_priority_percentage,
            },
            pregenerate_dag: config.mining.pregenerate_dag,
        };
        let coordinator = Arc::new(MiningCoordinator::new(
            Arc::clone(&params),
            chain.clone() as Arc<dyn ChainView>,
            Arc::clone(&mempool),
            Arc::new(NodeValidator),
            Arc::new(NodeProcessor {
                chain: Arc::clone(&chain),
                mempool: Arc::clone(&mempool),
            }),
            Arc::new(NullWalletHooks),
            miner_config,
        ));

        Ok(Self {
            params,
            chain,
            mempool,
            coordinator,
            config,
        })
    }

    /// Run until the returned future is dropped or the task is aborted.
    pub async fn run(&self) -> Result<()> {
        let script = match &self.config.mining.coinbase_script {
            Some(hex) => {
                Script::from_hex(hex).map_err(|_| anyhow!("invalid mining.coinbase_script"))?
            }
            None => Script::new(),
        };

        if self.config.mining.enabled {
            if script.is_empty() {
                warn!("Mining enabled but no coinbase script configured");
            } else {
                self.coordinator.set_coinbase_script(script.clone());
                self.coordinator.start();
                info!("Mining coordinator started");
            }
        }

        let state = AppState {
            params: Arc::clone(&self.params),
            chain: self.chain.clone() as Arc<dyn ChainView>,
            mempool: Arc::clone(&self.mempool),
            coordinator: Arc::clone(&self.coordinator),
            script_provider: Arc::new(StaticScript(script)),
            deposits: Arc::new(NullDeposits),
        };

        let listener = tokio::net::TcpListener::bind(&self.config.api.bind_address).await?;
        info!(addr = %self.config.api.bind_address, "API listening");
        axum::serve(listener, platopia_api::router(state)).await?;
        Ok(())
    }

    pub fn shutdown(&self) {
        self.coordinator.stop();
    }
}

//! Completed-block hand-off.

use tracing::{error, info};

use platopia_consensus::{Block, ChainView};

use crate::error::{MiningError, MiningResult};
use crate::traits::{BlockProcessor, WalletMiningHooks};

/// Hand a solved block to validation.
///
/// The parent is re-checked against the tip first: losing that race is
/// routine and the block is dropped with a log record. Acceptance flows
/// through the same path a peer-received block takes.
pub fn process_block_found(
    block: &Block,
    chain: &dyn ChainView,
    processor: &dyn BlockProcessor,
    wallet: &dyn WalletMiningHooks,
) -> MiningResult<()> {
    let hash = block.hash();
    info!(block = %hash, value = block.txs[0].value_out().unwrap_or(0), "Block found");

    let tip = chain.tip();
    if block.header.prev_hash != tip.hash {
        error!(block = %hash, "Generated block is stale");
        return Err(MiningError::StaleBlock);
    }

    wallet.block_found(&hash);

    if !processor.process_new_block(block) {
        error!(block = %hash, "ProcessNewBlock: block not accepted");
        return Err(MiningError::InvalidSolution);
    }

    info!(block = %hash, "Block mined");
    wallet.block_mined(&hash);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NullWalletHooks;
    use platopia_consensus::{ChainParams, HeaderChain, Network};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingProcessor {
        accept: AtomicBool,
        calls: AtomicUsize,
    }

    impl BlockProcessor for CountingProcessor {
        fn process_new_block(&self, _block: &Block) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.accept.load(Ordering::SeqCst)
        }
    }

    fn setup() -> (HeaderChain, Block) {
        let params = ChainParams::for_network(Network::Regtest);
        let chain = HeaderChain::new(params.genesis_block(), u64::MAX);
        let mut block = params.genesis_block().clone();
        block.header.prev_hash = chain.tip().hash;
        block.header.height = 1;
        (chain, block)
    }

    #[test]
    fn stale_parent_is_dropped_before_validation() {
        let (chain, mut block) = setup();
        block.header.prev_hash = Default::default();
        let processor = CountingProcessor {
            accept: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        };
        let result = process_block_found(&block, &chain, &processor, &NullWalletHooks);
        assert!(matches!(result, Err(MiningError::StaleBlock)));
        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rejection_maps_to_invalid_solution() {
        let (chain, block) = setup();
        let processor = CountingProcessor {
            accept: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        };
        let result = process_block_found(&block, &chain, &processor, &NullWalletHooks);
        assert!(matches!(result, Err(MiningError::InvalidSolution)));
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn acceptance_flows_through() {
        let (chain, block) = setup();
        let processor = CountingProcessor {
            accept: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        };
        process_block_found(&block, &chain, &processor, &NullWalletHooks).unwrap();
    }
}

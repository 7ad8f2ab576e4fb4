//! Chain view.
//!
//! Validation and storage live outside this workspace's core; the template
//! builder and miner only ever need a consistent snapshot of the active
//! tip and access to historical headers. [`HeaderChain`] is the in-memory
//! implementation used by the node and the test harness.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::block::{Block, BlockHash, BlockHeader};
use crate::error::{ConsensusError, ConsensusResult};

/// Number of block times the past-median is taken over.
const MEDIAN_TIME_SPAN: usize = 11;

/// A consistent snapshot of the active chain tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTip {
    pub hash: BlockHash,
    pub height: u32,
    pub time: u32,
    pub median_time_past: u32,
    pub chain_interest: u64,
    pub bits: u32,
}

/// Read access to the active chain.
pub trait ChainView: Send + Sync {
    /// The current tip, as one coherent snapshot.
    fn tip(&self) -> ChainTip;

    /// Header at `height` on the active chain, if present.
    fn header_at(&self, height: u32) -> Option<BlockHeader>;

    /// The network-adjusted wall clock.
    fn adjusted_time(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }
}

/// A minimal in-memory header chain.
///
/// Connecting a block checks linkage and the chain-interest bounds; full
/// validation stays with the external collaborator.
pub struct HeaderChain {
    total_interest: u64,
    headers: RwLock<Vec<BlockHeader>>,
}

impl HeaderChain {
    /// A chain consisting of the given genesis block.
    pub fn new(genesis: &Block, total_interest: u64) -> Self {
        Self {
            total_interest,
            headers: RwLock::new(vec![genesis.header.clone()]),
        }
    }

    /// Current height (genesis is height 0).
    pub fn height(&self) -> u32 {
        self.headers.read().len() as u32 - 1
    }

    /// Append a block that extends the current tip.
    pub fn connect(&self, block: &Block) -> ConsensusResult<()> {
        let mut headers = self.headers.write();
        let tip = headers.last().expect("chain never empty");
        let tip_hash = tip.hash();
        if block.header.prev_hash != tip_hash {
            return Err(ConsensusError::DoesNotConnect {
                want: tip_hash.to_string(),
                got: block.header.prev_hash.to_string(),
            });
        }
        if block.header.height != tip.height + 1 {
            return Err(ConsensusError::DoesNotConnect {
                want: format!("height {}", tip.height + 1),
                got: format!("height {}", block.header.height),
            });
        }
        if block.header.chain_interest < tip.chain_interest
            || block.header.chain_interest > self.total_interest
        {
            return Err(ConsensusError::InterestOutOfBounds(block.header.height));
        }
        headers.push(block.header.clone());
        Ok(())
    }

    fn median_time_past(headers: &[BlockHeader]) -> u32 {
        let take = headers.len().min(MEDIAN_TIME_SPAN);
        let mut times: Vec<u32> = headers[headers.len() - take..]
            .iter()
            .map(|h| h.time)
            .collect();
        times.sort_unstable();
        times[times.len() / 2]
    }
}

impl ChainView for HeaderChain {
    fn tip(&self) -> ChainTip {
        let headers = self.headers.read();
        let tip = headers.last().expect("chain never empty");
        ChainTip {
            hash: tip.hash(),
            height: tip.height,
            time: tip.time,
            median_time_past: Self::median_time_past(&headers),
            chain_interest: tip.chain_interest,
            bits: tip.bits,
        }
    }

    fn header_at(&self, height: u32) -> Option<BlockHeader> {
        self.headers.read().get(height as usize).cloned()
    }
}

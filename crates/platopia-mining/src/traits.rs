//! Collaborator interfaces.
//!
//! Block validation, block acceptance and wallet key management live
//! outside this crate; the miner consumes them through these traits.

use std::sync::Arc;

use platopia_consensus::{Block, BlockHash, ChainTip, Script, Transaction};

/// Pre-versionbits block version used for assembled headers.
pub const DEFAULT_BLOCK_VERSION: i32 = 4;

/// Accepts solved blocks the same way a block received from a peer is
/// accepted.
pub trait BlockProcessor: Send + Sync {
    /// Fully validate and connect a block. `true` means accepted.
    fn process_new_block(&self, block: &Block) -> bool;
}

/// The validation hooks the template builder needs.
pub trait BlockValidator: Send + Sync {
    /// Cheap self-check of a freshly assembled block against the tip it
    /// was built on.
    fn test_block_validity(&self, block: &Block, tip: &ChainTip) -> Result<(), String>;

    /// Whether a transaction is final and contextually valid for a block
    /// at `height` with the given lock-time cutoff.
    fn contextual_check_transaction(
        &self,
        tx: &Transaction,
        height: u32,
        lock_time_cutoff: i64,
    ) -> bool;

    /// Version for a block extending `tip`.
    fn compute_block_version(&self, tip: &ChainTip) -> i32 {
        let _ = tip;
        DEFAULT_BLOCK_VERSION
    }
}

/// Wallet-side bookkeeping around mined blocks.
pub trait WalletMiningHooks: Send + Sync {
    /// A block built by us is about to be submitted; reset its network
    /// request tracking.
    fn block_found(&self, hash: &BlockHash);

    /// A block built by us was accepted into the chain.
    fn block_mined(&self, hash: &BlockHash);
}

/// No-op wallet hooks for wallet-less deployments.
pub struct NullWalletHooks;

impl WalletMiningHooks for NullWalletHooks {
    fn block_found(&self, _hash: &BlockHash) {}
    fn block_mined(&self, _hash: &BlockHash) {}
}

/// A coinbase script reserved from the wallet's key pool.
///
/// `keep` marks the underlying key as used so the wallet stops handing
/// it out; dropping the reservation without keeping returns the key.
pub trait ReserveScript: Send + Sync {
    fn script(&self) -> Script;
    fn keep(&self);
}

/// Hands out coinbase scripts. `None` means the key pool is exhausted.
pub trait CoinbaseScriptProvider: Send + Sync {
    fn reserve_script(&self) -> Option<Arc<dyn ReserveScript>>;
}

/// A fixed script, used by `generatetoaddress` and tests.
pub struct StaticScript(pub Script);

impl ReserveScript for StaticScript {
    fn script(&self) -> Script {
        self.0.clone()
    }

    fn keep(&self) {}
}

impl CoinbaseScriptProvider for StaticScript {
    fn reserve_script(&self) -> Option<Arc<dyn ReserveScript>> {
        Some(Arc::new(StaticScript(self.0.clone())))
    }
}

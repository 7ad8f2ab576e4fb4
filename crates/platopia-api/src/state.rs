//! Shared handler state.

use std::sync::Arc;

use platopia_consensus::{Amount, ChainParams, ChainView, TxId};
use platopia_mempool::Mempool;
use platopia_mining::{CoinbaseScriptProvider, MiningCoordinator};

/// A time-locked deposit output as the wallet sees it.
#[derive(Debug, Clone)]
pub struct DepositOutput {
    pub txid: TxId,
    pub vout: u32,
    /// Confirmation height.
    pub height: u32,
    pub value: Amount,
    pub principal: Amount,
    pub lock_time: u32,
}

/// Wallet-side view of deposit outputs, consumed by the interest surface.
pub trait DepositView: Send + Sync {
    fn all_deposits(&self) -> Vec<DepositOutput>;
}

/// Deposit view of a wallet-less node.
pub struct NullDeposits;

impl DepositView for NullDeposits {
    fn all_deposits(&self) -> Vec<DepositOutput> {
        Vec::new()
    }
}

/// Everything the handlers need.
#[derive(Clone)]
pub struct AppState {
    pub params: Arc<ChainParams>,
    pub chain: Arc<dyn ChainView>,
    pub mempool: Arc<Mempool>,
    pub coordinator: Arc<MiningCoordinator>,
    pub script_provider: Arc<dyn CoinbaseScriptProvider>,
    pub deposits: Arc<dyn DepositView>,
}

//! Mempool entries.

use std::collections::BTreeSet;
use std::sync::Arc;

use platopia_consensus::{Amount, Transaction, TxId};

/// A pooled transaction together with its package statistics.
///
/// The `ancestor_*` totals include the entry itself and every unconfirmed
/// ancestor still in the pool; the pool keeps them current as relatives
/// arrive and leave. `modified_fee` is the base fee shifted by any
/// operator prioritisation delta.
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    pub tx: Arc<Transaction>,
    pub fee: Amount,
    pub modified_fee: Amount,
    pub interest: Amount,
    pub size: u64,
    pub sigop_count: u64,

    pub entry_height: u32,
    entry_priority: f64,
    in_chain_input_value: Amount,
    modified_size: u64,

    pub ancestor_size: u64,
    pub ancestor_mod_fees: Amount,
    pub ancestor_sigops: u64,
    /// Unconfirmed ancestors plus self.
    pub ancestor_count: u64,
    /// Unconfirmed descendants plus self.
    pub descendant_count: u64,

    pub parents: BTreeSet<TxId>,
    pub children: BTreeSet<TxId>,
}

impl MempoolEntry {
    pub fn new(
        tx: Arc<Transaction>,
        fee: Amount,
        interest: Amount,
        entry_height: u32,
        entry_priority: f64,
        in_chain_input_value: Amount,
    ) -> Self {
        let size = tx.serialized_size();
        let sigop_count = tx.sigop_count();
        let modified_size = tx.modified_size();
        Self {
            tx,
            fee,
            modified_fee: fee,
            interest,
            size,
            sigop_count,
            entry_height,
            entry_priority,
            in_chain_input_value,
            modified_size,
            ancestor_size: size,
            ancestor_mod_fees: fee,
            ancestor_sigops: sigop_count,
            ancestor_count: 1,
            descendant_count: 1,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        }
    }

    pub fn txid(&self) -> TxId {
        self.tx.id()
    }

    /// Coin-age priority at `height`: the priority computed at entry time
    /// plus the aging of the confirmed input value since then.
    pub fn priority(&self, height: u32) -> f64 {
        if self.modified_size == 0 {
            return self.entry_priority;
        }
        let aged = height.saturating_sub(self.entry_height) as f64
            * self.in_chain_input_value as f64
            / self.modified_size as f64;
        self.entry_priority + aged
    }
}

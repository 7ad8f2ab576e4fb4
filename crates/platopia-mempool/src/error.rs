//! Mempool error types.

use thiserror::Error;

/// Mempool errors.
#[derive(Error, Debug)]
pub enum MempoolError {
    /// Transaction already pooled.
    #[error("Transaction {0} already in mempool")]
    AlreadyExists(String),

    /// Transaction not found.
    #[error("Transaction {0} not in mempool")]
    NotFound(String),

    /// Coinbase transactions never enter the pool.
    #[error("Coinbase transaction {0} rejected")]
    Coinbase(String),

    /// Consensus-level failure while computing entry statistics.
    #[error("Consensus error: {0}")]
    Consensus(#[from] platopia_consensus::ConsensusError),
}

/// Result type for mempool operations.
pub type MempoolResult<T> = Result<T, MempoolError>;

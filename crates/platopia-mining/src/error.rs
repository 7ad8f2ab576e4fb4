//! Mining error types.

use thiserror::Error;

/// Mining errors.
#[derive(Error, Debug)]
pub enum MiningError {
    /// No valid block template could be formed; the caller retries on the
    /// next tip change.
    #[error("Template build failed: {0}")]
    TemplateBuildFailed(String),

    /// A solved block's parent is no longer the chain tip.
    #[error("Generated block is stale")]
    StaleBlock,

    /// The full DAG for the requested epoch is still being generated.
    #[error("DAG not yet available")]
    DagUnavailable,

    /// The solution passed the boundary check but the block was rejected
    /// by consensus validation.
    #[error("Block not accepted by validation")]
    InvalidSolution,

    /// No coinbase script could be reserved from the wallet.
    #[error("Keypool ran out, no coinbase script available")]
    WalletKeypoolEmpty,

    /// Consensus error.
    #[error("Consensus error: {0}")]
    Consensus(#[from] platopia_consensus::ConsensusError),
}

/// Result type for mining operations.
pub type MiningResult<T> = Result<T, MiningError>;

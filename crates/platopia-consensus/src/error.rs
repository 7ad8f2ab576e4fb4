//! Consensus error types.

use thiserror::Error;

/// Consensus errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// Chain parameter selection got a name it does not know.
    #[error("Unknown chain {0}")]
    UnknownChain(String),

    /// Amount arithmetic left the valid money range.
    #[error("Value out of range")]
    ValueOutOfRange,

    /// A compact difficulty encoding is negative, zero or overflows.
    #[error("Invalid compact target {0:#010x}")]
    InvalidCompactTarget(u32),

    /// A block does not extend the expected parent.
    #[error("Block {got} does not connect to tip {want}")]
    DoesNotConnect { want: String, got: String },

    /// Chain interest regressed or exceeded the lifetime cap.
    #[error("Chain interest out of bounds at height {0}")]
    InterestOutOfBounds(u32),
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;

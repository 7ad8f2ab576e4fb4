//! # platopia-mempool
//!
//! The transaction memory pool. Entries carry the package statistics the
//! block template builder selects on: size, fee, sig-ops and interest of
//! the transaction together with all of its unconfirmed ancestors, plus
//! the parent/child relation as id sets.
//!
//! The pool is read-only for the duration of one template build; all
//! builder-local state (what is already in the block, adjusted package
//! totals) lives in the builder, not here.

mod entry;
mod error;
mod ordering;
mod pool;

pub use entry::MempoolEntry;
pub use error::{MempoolError, MempoolResult};
pub use ordering::AncestorScoreKey;
pub use pool::{Mempool, MempoolConfig, MempoolView};

/// Default cap on pooled transactions.
pub const DEFAULT_MAX_TRANSACTIONS: usize = 50_000;

//! # platopia-mining
//!
//! The Platopia mining engine:
//! - [`BlockAssembler`]: builds block templates from the mempool under
//!   size, sig-op and fee-rate policy.
//! - [`DagCache`]: Ethash light caches and full datasets keyed by epoch.
//! - [`WorkRegistry`]: the live set of candidate headers being mined.
//! - [`MiningCoordinator`]: the dispatcher, DAG pre-generator and worker
//!   thread pool, plus the `getwork`-style pool surface.
//!
//! Validation, block acceptance and wallet keys are consumed through the
//! traits in [`traits`].

mod assembler;
mod coordinator;
mod dag;
pub mod ethash;
mod error;
mod submit;
pub mod traits;
mod work;

pub use assembler::{
    last_block_size, last_block_tx, update_time, AssemblerConfig, BlockAssembler, BlockTemplate,
};
pub use coordinator::{MinerConfig, MiningCoordinator};
pub use dag::{DagCache, DagProgressFn};
pub use error::{MiningError, MiningResult};
pub use submit::process_block_found;
pub use traits::{
    BlockProcessor, BlockValidator, CoinbaseScriptProvider, NullWalletHooks, ReserveScript,
    StaticScript, WalletMiningHooks,
};
pub use work::{WorkEntry, WorkRegistry};

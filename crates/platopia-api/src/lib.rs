//! # platopia-api
//!
//! HTTP surface of the node: the Ethash pool protocol
//! (`eth_getWork` / `eth_submitWork` / `eth_submitHashrate`), synchronous
//! block generation, mining info, transaction prioritisation and the
//! locked-deposit interest queries.
//!
//! Transport is plain axum + JSON; the historical RPC error codes ride
//! along in every error body.

pub mod error;
pub mod handlers;
mod routes;
mod state;

pub use error::{rpc_codes, ApiError, ApiResult};
pub use routes::router;
pub use state::{AppState, DepositOutput, DepositView, NullDeposits};

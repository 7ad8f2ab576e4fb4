//! API error types.
//!
//! Errors carry the RPC error codes miners and wallets have always seen,
//! inside an HTTP error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Classic RPC error codes preserved on the wire.
pub mod rpc_codes {
    pub const RPC_INVALID_ADDRESS_OR_KEY: i32 = -5;
    pub const RPC_INVALID_PARAMETER: i32 = -8;
    pub const RPC_WALLET_KEYPOOL_RAN_OUT: i32 = -12;
    pub const RPC_VERIFY_ERROR: i32 = -25;
    pub const RPC_INTERNAL_ERROR: i32 = -32603;
}

/// API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or out-of-range parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unparseable address or key material.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The wallet has no coinbase script to hand out.
    #[error("Keypool ran out, please call keypoolrefill first")]
    KeypoolRanOut,

    /// Block or transaction failed verification.
    #[error("Verify error: {0}")]
    VerifyError(String),

    /// Internal failure.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Mining engine error.
    #[error("Mining error: {0}")]
    Mining(#[from] platopia_mining::MiningError),

    /// Mempool error.
    #[error("Mempool error: {0}")]
    Mempool(#[from] platopia_mempool::MempoolError),
}

/// Error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub reason: String,
    pub detail: String,
}

impl ApiError {
    fn code(&self) -> i32 {
        use rpc_codes::*;
        match self {
            ApiError::InvalidParameter(_) => RPC_INVALID_PARAMETER,
            ApiError::InvalidAddress(_) => RPC_INVALID_ADDRESS_OR_KEY,
            ApiError::KeypoolRanOut => RPC_WALLET_KEYPOOL_RAN_OUT,
            ApiError::VerifyError(_) => RPC_VERIFY_ERROR,
            ApiError::Mining(platopia_mining::MiningError::WalletKeypoolEmpty) => {
                RPC_WALLET_KEYPOOL_RAN_OUT
            }
            ApiError::Mining(platopia_mining::MiningError::InvalidSolution) => RPC_VERIFY_ERROR,
            _ => RPC_INTERNAL_ERROR,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidParameter(_) | ApiError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            ApiError::Mempool(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code(),
            reason: match self.status() {
                StatusCode::BAD_REQUEST => "Bad Request".to_string(),
                _ => "Internal Server Error".to_string(),
            },
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

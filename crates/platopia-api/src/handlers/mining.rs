//! Mining and pool-protocol handlers.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use platopia_consensus::{EthHash, Script};
use platopia_mining::ethash::seed_hash;
use platopia_mining::{last_block_size, last_block_tx, StaticScript};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Default nonce budget per `generate` attempt.
const DEFAULT_MAX_TRIES: u64 = 1_000_000;

fn parse_hex_u64(value: &str, name: &str) -> ApiResult<u64> {
    let raw = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(raw, 16)
        .map_err(|_| ApiError::InvalidParameter(format!("{name} is not hex")))
}

fn parse_eth_hash(value: &str, name: &str) -> ApiResult<EthHash> {
    EthHash::from_hex(value).map_err(|_| ApiError::InvalidParameter(format!("{name} is not hex")))
}

/// GET /mining/eth/getwork
///
/// The freshest live candidate as `[headerHash, seedHash, boundary]`.
#[utoipa::path(
    get,
    path = "/mining/eth/getwork",
    tag = "mining",
    responses(
        (status = 200, description = "Work package", body = [String]),
        (status = 500, description = "Keypool exhausted")
    )
)]
pub async fn eth_get_work(State(state): State<AppState>) -> ApiResult<Json<[String; 3]>> {
    let reserve = state
        .script_provider
        .reserve_script()
        .ok_or(ApiError::KeypoolRanOut)?;
    if reserve.script().is_empty() {
        return Err(ApiError::Internal(
            "No coinbase script available (mining requires a wallet)".to_string(),
        ));
    }

    let entry = state.coordinator.get_last_new_work(&reserve, true)?;
    Ok(Json([
        entry.block_ethash.to_string(),
        seed_hash(entry.height).to_string(),
        entry.boundary.to_string(),
    ]))
}

/// `eth_submitWork` parameters.
#[derive(Deserialize, ToSchema)]
pub struct SubmitWorkRequest {
    /// Nonce, "0x" hex.
    pub nonce: String,
    /// Seal input of the base header, "0x" hex.
    pub header_hash: String,
    /// Mix hash, "0x" hex.
    pub mix_hash: String,
}

/// POST /mining/eth/submitwork
#[utoipa::path(
    post,
    path = "/mining/eth/submitwork",
    tag = "mining",
    request_body = SubmitWorkRequest,
    responses((status = 200, description = "Whether the solution was accepted", body = bool))
)]
pub async fn eth_submit_work(
    State(state): State<AppState>,
    Json(request): Json<SubmitWorkRequest>,
) -> ApiResult<Json<bool>> {
    let nonce = parse_hex_u64(&request.nonce, "nonce")?;
    let header_hash = parse_eth_hash(&request.header_hash, "header_hash")?;
    let mix_hash = parse_eth_hash(&request.mix_hash, "mix_hash")?;

    Ok(Json(state.coordinator.submit_work(
        header_hash,
        nonce,
        mix_hash,
    )))
}

/// `eth_submitHashrate` parameters.
#[derive(Deserialize, ToSchema)]
pub struct SubmitHashrateRequest {
    /// Hashes per second, "0x" hex.
    pub hashrate: String,
}

/// POST /mining/eth/submithashrate
#[utoipa::path(
    post,
    path = "/mining/eth/submithashrate",
    tag = "mining",
    request_body = SubmitHashrateRequest,
    responses((status = 200, description = "Always true", body = bool))
)]
pub async fn eth_submit_hashrate(
    State(state): State<AppState>,
    Json(request): Json<SubmitHashrateRequest>,
) -> ApiResult<Json<bool>> {
    let rate = parse_hex_u64(&request.hashrate, "hashrate")?;
    state.coordinator.set_hash_rate(rate as f64);
    Ok(Json(true))
}

/// `generate` parameters.
#[derive(Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Number of blocks to mine before returning.
    pub nblocks: u32,
    /// Nonce budget per attempt.
    pub maxtries: Option<u64>,
}

/// POST /mining/generate
///
/// Mine blocks to a wallet-reserved script, synchronously.
#[utoipa::path(
    post,
    path = "/mining/generate",
    tag = "generating",
    request_body = GenerateRequest,
    responses((status = 200, description = "Hashes of generated blocks", body = [String]))
)]
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<Vec<String>>> {
    let reserve = state
        .script_provider
        .reserve_script()
        .ok_or(ApiError::KeypoolRanOut)?;
    if reserve.script().is_empty() {
        return Err(ApiError::Internal(
            "No coinbase script available (mining requires a wallet)".to_string(),
        ));
    }
    let max_tries = request.maxtries.unwrap_or(DEFAULT_MAX_TRIES);

    let coordinator = state.coordinator.clone();
    let hashes = tokio::task::spawn_blocking(move || {
        coordinator.mine_blocks(reserve, request.nblocks, max_tries, true)
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(Json(hashes.iter().map(|h| h.to_string()).collect()))
}

/// `generatetoaddress` parameters.
#[derive(Deserialize, ToSchema)]
pub struct GenerateToAddressRequest {
    /// Number of blocks to mine before returning.
    pub nblocks: u32,
    /// Destination, as a hex-encoded output script.
    pub address: String,
    /// Nonce budget per attempt.
    pub maxtries: Option<u64>,
}

/// POST /mining/generatetoaddress
#[utoipa::path(
    post,
    path = "/mining/generatetoaddress",
    tag = "generating",
    request_body = GenerateToAddressRequest,
    responses((status = 200, description = "Hashes of generated blocks", body = [String]))
)]
pub async fn generate_to_address(
    State(state): State<AppState>,
    Json(request): Json<GenerateToAddressRequest>,
) -> ApiResult<Json<Vec<String>>> {
    let script = Script::from_hex(&request.address)
        .map_err(|_| ApiError::InvalidAddress(request.address.clone()))?;
    if script.is_empty() {
        return Err(ApiError::InvalidAddress(request.address));
    }
    let max_tries = request.maxtries.unwrap_or(DEFAULT_MAX_TRIES);

    let coordinator = state.coordinator.clone();
    let hashes = tokio::task::spawn_blocking(move || {
        let reserve = std::sync::Arc::new(StaticScript(script));
        coordinator.mine_blocks(reserve, request.nblocks, max_tries, false)
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(Json(hashes.iter().map(|h| h.to_string()).collect()))
}

/// Mining state summary.
#[derive(Serialize, ToSchema)]
pub struct MiningInfo {
    pub blocks: u32,
    pub currentblocksize: u64,
    pub currentblocktx: u64,
    pub generate: bool,
    pub hashespersec: f64,
    pub pooledtx: usize,
    pub chain: String,
}

/// GET /mining/info
#[utoipa::path(
    get,
    path = "/mining/info",
    tag = "mining",
    responses((status = 200, description = "Mining info", body = MiningInfo))
)]
pub async fn get_mining_info(State(state): State<AppState>) -> ApiResult<Json<MiningInfo>> {
    Ok(Json(MiningInfo {
        blocks: state.chain.tip().height,
        currentblocksize: last_block_size(),
        currentblocktx: last_block_tx(),
        generate: state.coordinator.is_generating(),
        hashespersec: state.coordinator.hash_rate(),
        pooledtx: state.mempool.len(),
        chain: state.params.network.name().to_string(),
    }))
}

/// `prioritisetransaction` parameters.
#[derive(Deserialize, ToSchema)]
pub struct PrioritiseRequest {
    /// Transaction id, hex.
    pub txid: String,
    /// Priority to add or subtract.
    pub priority_delta: f64,
    /// Fee to pretend was paid, in smallest units.
    pub fee_delta: i64,
}

/// POST /mining/prioritisetransaction
#[utoipa::path(
    post,
    path = "/mining/prioritisetransaction",
    tag = "mining",
    request_body = PrioritiseRequest,
    responses((status = 200, description = "Always true", body = bool))
)]
pub async fn prioritise_transaction(
    State(state): State<AppState>,
    Json(request): Json<PrioritiseRequest>,
) -> ApiResult<Json<bool>> {
    let txid = platopia_consensus::TxId::from_hex(&request.txid)
        .map_err(|_| ApiError::InvalidParameter("txid is not hex".to_string()))?;
    state
        .mempool
        .prioritise(txid, request.priority_delta, request.fee_delta);
    Ok(Json(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_u64_accepts_prefixes() {
        assert_eq!(parse_hex_u64("0x10", "n").unwrap(), 16);
        assert_eq!(parse_hex_u64("ff", "n").unwrap(), 255);
        assert!(parse_hex_u64("zz", "n").is_err());
    }

    #[test]
    fn eth_hash_parsing_round_trips() {
        let hash = EthHash([0xab; 32]);
        assert_eq!(parse_eth_hash(&hash.to_string(), "h").unwrap(), hash);
        assert!(parse_eth_hash("0x12", "h").is_err());
    }
}

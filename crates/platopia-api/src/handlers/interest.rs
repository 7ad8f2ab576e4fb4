//! Locked-deposit interest handlers.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use platopia_consensus::{
    adjust_to_lock_threshold, interest_info, interest_rate, lock_interest, lock_tier, Amount, COIN,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn coins(amount: Amount) -> f64 {
    amount as f64 / COIN as f64
}

fn percent(value: u32) -> String {
    format!("{value}%")
}

/// Interest info of the current accrual period.
#[derive(Serialize, ToSchema)]
pub struct PeriodInterestInfo {
    pub total: f64,
    pub taken: f64,
    #[serde(rename = "takenPercentage")]
    pub taken_percentage: String,
    pub left: f64,
    #[serde(rename = "leftPercentage")]
    pub left_percentage: String,
}

/// Chain-wide interest budget.
#[derive(Serialize, ToSchema)]
pub struct InterestInfoResponse {
    pub total: f64,
    pub left: f64,
    #[serde(rename = "leftPercentage")]
    pub left_percentage: String,
    #[serde(rename = "currentPeriod")]
    pub current_period: PeriodInterestInfo,
}

/// GET /interest/info
///
/// Interest taken and remaining, chain-wide and for the current
/// 100-block-day period.
#[utoipa::path(
    get,
    path = "/interest/info",
    tag = "interest",
    responses((status = 200, description = "Interest budget", body = InterestInfoResponse))
)]
pub async fn get_interest_info(
    State(state): State<AppState>,
) -> ApiResult<Json<InterestInfoResponse>> {
    let consensus = &state.params.consensus;
    let tip = state.chain.tip();

    let period_start_height =
        tip.height - tip.height % consensus.blocks_interest_interval();
    let period_start = state
        .chain
        .header_at(period_start_height)
        .ok_or_else(|| ApiError::Internal("Can't get interest info, please retry.".to_string()))?;

    let info = interest_info(consensus, tip.chain_interest, period_start.chain_interest);
    Ok(Json(InterestInfoResponse {
        total: coins(info.total),
        left: coins(info.left),
        left_percentage: percent(info.left_percentage),
        current_period: PeriodInterestInfo {
            total: coins(info.period_total),
            taken: coins(info.period_taken),
            taken_percentage: percent(info.period_taken_percentage),
            left: coins(info.left),
            left_percentage: percent(100 - info.period_taken_percentage.min(100)),
        },
    }))
}

/// The wallet's locked principal and accrued interest.
#[derive(Serialize, ToSchema)]
pub struct MyInterestResponse {
    #[serde(rename = "LockedPrincipal")]
    pub locked_principal: f64,
    #[serde(rename = "LockedInterest")]
    pub locked_interest: f64,
}

/// GET /interest/mine
#[utoipa::path(
    get,
    path = "/interest/mine",
    tag = "interest",
    responses((status = 200, description = "Locked principal and interest", body = MyInterestResponse))
)]
pub async fn get_my_interest(State(state): State<AppState>) -> ApiResult<Json<MyInterestResponse>> {
    let current_height = state.chain.tip().height;
    let mut principal: Amount = 0;
    let mut interest: Amount = 0;
    for deposit in state.deposits.all_deposits() {
        if current_height - deposit.height + 1 <= deposit.lock_time {
            principal += deposit.principal;
            interest += deposit.value - deposit.principal;
        }
    }
    Ok(Json(MyInterestResponse {
        locked_principal: coins(principal),
        locked_interest: coins(interest),
    }))
}

/// One deposit in the interest list.
#[derive(Serialize, ToSchema)]
pub struct DepositItem {
    pub txid: String,
    pub vout: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "remainBlocks")]
    pub remain_blocks: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "remainDays")]
    pub remain_days: Option<i64>,
    #[serde(rename = "interestRatePer100Days")]
    pub interest_rate_per_100_days: String,
    pub principal: f64,
    pub interest: f64,
}

/// All deposits, split into still-locked and finished.
#[derive(Serialize, ToSchema)]
pub struct InterestListResponse {
    #[serde(rename = "lockedDeposit")]
    pub locked_deposit: Vec<DepositItem>,
    #[serde(rename = "finishedDeposit")]
    pub finished_deposit: Vec<DepositItem>,
}

/// GET /interest/list
#[utoipa::path(
    get,
    path = "/interest/list",
    tag = "interest",
    responses((status = 200, description = "Locked and finished deposits", body = InterestListResponse))
)]
pub async fn get_interest_list(
    State(state): State<AppState>,
) -> ApiResult<Json<InterestListResponse>> {
    let consensus = &state.params.consensus;
    let current_height = state.chain.tip().height as i64;
    let blocks_per_day = consensus.blocks_per_day as i64;

    let mut locked = Vec::new();
    let mut finished = Vec::new();
    for deposit in state.deposits.all_deposits() {
        let remain_blocks =
            deposit.lock_time as i64 - (current_height - deposit.height as i64 + 1) + 1;
        let rate = lock_tier(deposit.lock_time, consensus)
            .map(interest_rate)
            .unwrap_or(0.0);
        let item = DepositItem {
            txid: deposit.txid.to_string(),
            vout: deposit.vout,
            remain_blocks: (remain_blocks > 0).then_some(remain_blocks),
            remain_days: (remain_blocks > 0)
                .then(|| (remain_blocks + blocks_per_day - 1) / blocks_per_day),
            interest_rate_per_100_days: format!("{:.5}%", rate * 100.0),
            principal: coins(deposit.principal),
            interest: coins(deposit.value - deposit.principal),
        };
        if remain_blocks <= 0 {
            finished.push(item);
        } else {
            locked.push(item);
        }
    }

    Ok(Json(InterestListResponse {
        locked_deposit: locked,
        finished_deposit: finished,
    }))
}

/// `getlockinterest` parameters.
#[derive(Deserialize, ToSchema)]
pub struct LockInterestRequest {
    /// Lock duration in days; one of 16, 32, 64, 128, 256, 512, 1024.
    pub lockdays: i64,
    /// Principal to deposit, in coins.
    pub principal: f64,
}

/// Quoted lock time and interest.
#[derive(Serialize, ToSchema)]
pub struct LockInterestResponse {
    /// Adjusted lock time in blocks; may be below `lockdays` worth.
    pub locktime: u32,
    pub interest: f64,
}

/// POST /interest/lock
#[utoipa::path(
    post,
    path = "/interest/lock",
    tag = "interest",
    request_body = LockInterestRequest,
    responses((status = 200, description = "Lock time and interest quote", body = LockInterestResponse))
)]
pub async fn get_lock_interest(
    State(state): State<AppState>,
    Json(request): Json<LockInterestRequest>,
) -> ApiResult<Json<LockInterestResponse>> {
    let consensus = &state.params.consensus;
    let lock_blocks = request.lockdays * consensus.blocks_per_day as i64;
    if lock_blocks <= 0 {
        return Err(ApiError::InvalidParameter(
            "Invalid locktime. Locktime must > 0.".to_string(),
        ));
    }
    let principal = (request.principal * COIN as f64).round() as Amount;
    if principal <= 0 {
        return Err(ApiError::InvalidParameter(
            "Invalid principal. Amount must > 0.".to_string(),
        ));
    }

    let interest = lock_interest(principal, lock_blocks as u32, consensus);
    let adjusted = adjust_to_lock_threshold(lock_blocks as u32, consensus);

    Ok(Json(LockInterestResponse {
        locktime: adjusted,
        interest: coins(interest),
    }))
}

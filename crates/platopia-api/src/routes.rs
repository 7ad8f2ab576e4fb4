//! Route table.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{interest, mining};
use crate::state::AppState;

/// The full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mining/eth/getwork", get(mining::eth_get_work))
        .route("/mining/eth/submitwork", post(mining::eth_submit_work))
        .route(
            "/mining/eth/submithashrate",
            post(mining::eth_submit_hashrate),
        )
        .route("/mining/generate", post(mining::generate))
        .route(
            "/mining/generatetoaddress",
            post(mining::generate_to_address),
        )
        .route("/mining/info", get(mining::get_mining_info))
        .route(
            "/mining/prioritisetransaction",
            post(mining::prioritise_transaction),
        )
        .route("/interest/info", get(interest::get_interest_info))
        .route("/interest/mine", get(interest::get_my_interest))
        .route("/interest/list", get(interest::get_interest_list))
        .route("/interest/lock", post(interest::get_lock_interest))
        .with_state(state)
}

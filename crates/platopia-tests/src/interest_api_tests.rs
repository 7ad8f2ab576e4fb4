//! Interest API scenarios.

use axum::extract::State;
use axum::Json;

use crate::harness::RegtestNode;
use platopia_api::handlers::interest::{
    get_interest_info, get_interest_list, get_lock_interest, get_my_interest, LockInterestRequest,
};
use platopia_api::DepositOutput;
use platopia_consensus::{TxId, COIN};

#[tokio::test]
async fn lock_interest_quote_matches_the_schedule() {
    let node = RegtestNode::new();
    let state = node.app_state();
    let blocks_per_day = node.params.consensus.blocks_per_day;

    let Json(response) = get_lock_interest(
        State(state),
        Json(LockInterestRequest {
            lockdays: 16,
            principal: 123.456,
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.locktime, 16 * blocks_per_day);
    // principal * 0.0142857 * (16 / 100), truncated to whole units.
    let expected_units = 12_345_600_000i64 * 142_857 * 16 / (10_000_000 * 100);
    assert!((response.interest - expected_units as f64 / COIN as f64).abs() < 1e-9);
}

#[tokio::test]
async fn lock_interest_rejects_non_positive_inputs() {
    let node = RegtestNode::new();

    let result = get_lock_interest(
        State(node.app_state()),
        Json(LockInterestRequest {
            lockdays: 0,
            principal: 1.0,
        }),
    )
    .await;
    assert!(result.is_err());

    let result = get_lock_interest(
        State(node.app_state()),
        Json(LockInterestRequest {
            lockdays: 16,
            principal: 0.0,
        }),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn interest_info_on_a_fresh_chain() {
    let node = RegtestNode::new();
    let Json(info) = get_interest_info(State(node.app_state())).await.unwrap();

    let total = node.params.consensus.total_interest as f64 / COIN as f64;
    assert_eq!(info.total, total);
    // The old-chain interest is already spoken for in the genesis header.
    assert!(info.left < info.total);
    assert!(info.left_percentage.ends_with('%'));
    assert_eq!(info.current_period.taken, 0.0);
}

#[tokio::test]
async fn my_interest_counts_only_still_locked_deposits() {
    let node = RegtestNode::new();
    let day = node.params.consensus.blocks_per_day;
    let deposits = vec![
        // Locked: confirmed at height 0 for 16 days, chain is at height 0.
        DepositOutput {
            txid: TxId([1; 32]),
            vout: 0,
            height: 0,
            value: 101 * COIN,
            principal: 100 * COIN,
            lock_time: 16 * day,
        },
        // Finished: lock of one block, confirmed long "ago".
        DepositOutput {
            txid: TxId([2; 32]),
            vout: 1,
            height: 0,
            value: 51 * COIN,
            principal: 50 * COIN,
            lock_time: 0,
        },
    ];
    let Json(mine) = get_my_interest(State(node.app_state_with_deposits(deposits)))
        .await
        .unwrap();

    assert_eq!(mine.locked_principal, 100.0);
    assert_eq!(mine.locked_interest, 1.0);
}

#[tokio::test]
async fn interest_list_splits_locked_and_finished() {
    let node = RegtestNode::new();
    let day = node.params.consensus.blocks_per_day;
    let deposits = vec![
        DepositOutput {
            txid: TxId([1; 32]),
            vout: 0,
            height: 0,
            value: 101 * COIN,
            principal: 100 * COIN,
            lock_time: 16 * day,
        },
        DepositOutput {
            txid: TxId([2; 32]),
            vout: 0,
            height: 0,
            value: 51 * COIN,
            principal: 50 * COIN,
            lock_time: 0,
        },
    ];
    let Json(list) = get_interest_list(State(node.app_state_with_deposits(deposits)))
        .await
        .unwrap();

    assert_eq!(list.locked_deposit.len(), 1);
    assert_eq!(list.finished_deposit.len(), 1);

    let locked = &list.locked_deposit[0];
    assert_eq!(locked.remain_blocks, Some(16 * day as i64));
    assert_eq!(locked.remain_days, Some(16));
    assert_eq!(locked.interest_rate_per_100_days, "1.42857%");
    assert_eq!(locked.principal, 100.0);
    assert_eq!(locked.interest, 1.0);

    let finished = &list.finished_deposit[0];
    assert!(finished.remain_blocks.is_none());
}

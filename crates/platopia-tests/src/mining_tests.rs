//! Mining coordinator scenarios.

use std::time::{Duration, Instant};

use crate::harness::RegtestNode;
use platopia_consensus::{ChainView, EthHash};
use platopia_mining::MinerConfig;

/// Poll until `cond` holds or the deadline passes.
fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    cond()
}

#[test]
fn work_registry_keeps_one_entry_per_seal_input() {
    let node = RegtestNode::new();
    let reserve = node.reserve();
    let first = node.coordinator.get_last_new_work(&reserve, false).unwrap();
    let second = node.coordinator.get_last_new_work(&reserve, false).unwrap();
    assert_eq!(first.block_ethash, second.block_ethash);
    assert_eq!(node.coordinator.works().len(), 1);
}

#[test]
fn submit_work_round_trip_extends_the_chain() {
    // Seal verification is the processor's job; the harness accepts any
    // linking block, so a synthetic solution flows all the way through.
    let node = RegtestNode::new();
    let reserve = node.reserve();
    let entry = node.coordinator.get_work(&reserve).unwrap();

    assert!(node
        .coordinator
        .submit_work(entry.block_ethash, 99, EthHash([3; 32])));
    assert_eq!(node.chain.tip().height, 1);
    assert_eq!(node.processor.accepted(), 1);
}

#[test]
fn submit_work_fake_seal_fails_pow_checking_validation() {
    // With the Ethash check enabled a fabricated nonce never survives
    // `process_new_block`; the work entry is discarded.
    let node = RegtestNode::with_config(
        MinerConfig {
            threads: 1,
            pregenerate_dag: false,
            ..Default::default()
        },
        true,
    );
    let reserve = node.reserve();
    let entry = node.coordinator.get_work(&reserve).unwrap();

    assert!(!node
        .coordinator
        .submit_work(entry.block_ethash, 99, EthHash([3; 32])));
    assert_eq!(node.chain.tip().height, 0);
    assert!(node.coordinator.works().get(&entry.block_ethash).is_none());
}

#[test]
fn dispatcher_deprecates_work_when_the_tip_advances() {
    let node = RegtestNode::with_config(
        MinerConfig {
            threads: 2,
            pregenerate_dag: false,
            ..Default::default()
        },
        false,
    );
    node.coordinator.set_coinbase_script(node.test_script());
    node.coordinator.start();

    // The dispatcher registers a candidate at height 1; without a DAG the
    // workers sit in the acquisition loop watching the work's flags.
    assert!(wait_for(Duration::from_secs(10), || {
        node.coordinator.works().len() == 1
    }));
    let entry = node.coordinator.works().get_any().expect("live work");
    assert_eq!(entry.height, 1);

    // Another miner delivers a block at the candidate's height.
    let mut external = entry.block();
    external.header.time += 7;
    external.update_merkle_root();
    node.chain.connect(&external).unwrap();

    // The dispatcher marks the candidate deprecated, the workers drain,
    // and a fresh candidate appears against the new tip.
    assert!(wait_for(Duration::from_secs(15), || {
        node.coordinator
            .works()
            .get_any()
            .map(|work| work.height == 2)
            .unwrap_or(false)
    }));
    assert!(entry.is_deprecated());
    assert_eq!(entry.threads(), 0);
    assert!(node.coordinator.works().get(&entry.block_ethash).is_none());

    node.coordinator.stop();
}

#[test]
fn stop_releases_work_and_dag_handles() {
    let node = RegtestNode::with_config(
        MinerConfig {
            threads: 2,
            pregenerate_dag: false,
            ..Default::default()
        },
        false,
    );
    node.coordinator.set_coinbase_script(node.test_script());
    node.coordinator.start();
    assert!(wait_for(Duration::from_secs(10), || {
        !node.coordinator.works().is_empty()
    }));

    node.coordinator.stop();
    assert!(!node.coordinator.is_generating());
    assert!(node.coordinator.works().is_empty());
    assert_eq!(node.coordinator.dag().sizes(), (0, 0));
}

#[test]
#[ignore = "builds the epoch-0 Ethash DAG (~1 GiB, minutes of CPU)"]
fn regtest_mine_one_block() {
    // The full pipeline: template over an empty mempool, DAG generation,
    // nonce search at the regtest boundary, submission, one-block
    // extension crediting subsidy(1).
    let node = RegtestNode::with_config(
        MinerConfig {
            threads: 1,
            pregenerate_dag: true,
            ..Default::default()
        },
        true,
    );
    let reserve = node.reserve();
    let hashes = node.coordinator.mine_blocks(reserve, 1, 0, false);

    assert_eq!(hashes.len(), 1);
    assert_eq!(node.chain.tip().height, 1);
    assert_eq!(node.chain.tip().hash, hashes[0]);

    let header = node.chain.header_at(1).unwrap();
    assert_eq!(header.prev_hash, node.params.genesis_hash());
}

//! Template assembly scenarios.

use crate::harness::{spend, spend_fanout, RegtestNode};
use platopia_consensus::{block_subsidy, Amount, FeeRate, TxId, COIN};
use platopia_mining::{AssemblerConfig, BlockAssembler, BlockTemplate};

fn build(node: &RegtestNode, config: AssemblerConfig) -> BlockTemplate {
    let assembler = BlockAssembler::new(
        &node.params,
        config,
        &*node.chain,
        &node.mempool,
        &crate::harness::HarnessValidator,
    );
    assembler.create_new_block(&node.test_script()).unwrap()
}

fn fee_only(min_fee_per_k: Amount) -> AssemblerConfig {
    AssemblerConfig {
        block_priority_percentage: 0,
        block_min_fee_rate: FeeRate::new(min_fee_per_k),
        ..Default::default()
    }
}

#[test]
fn package_selection_lifts_parent_but_not_sibling() {
    // A is a parent below the minimum rate on its own. B and C spend A;
    // B pays enough to lift the A->B package over the bar, C does not.
    let node = RegtestNode::new();
    let value = 10 * COIN;

    let a = spend_fanout(TxId([1; 32]), value, 100, 2);
    let a_id = a.id();
    let per_out = a.outputs[0].value;
    let b = spend(a_id, 0, per_out, per_out / 2);
    let b_id = b.id();
    let c = spend(a_id, 1, per_out, 1);
    let c_id = c.id();

    node.mempool.add(a, 100, 1, 0.0, value).unwrap();
    node.mempool.add(b, per_out / 2, 1, 0.0, 0).unwrap();
    node.mempool.add(c, 1, 1, 0.0, 0).unwrap();

    let template = build(&node, fee_only(10_000));
    let order: Vec<TxId> = template.block.txs.iter().map(|tx| tx.id()).collect();

    let a_pos = order.iter().position(|id| *id == a_id);
    let b_pos = order.iter().position(|id| *id == b_id);
    assert!(a_pos.is_some(), "parent selected via child package");
    assert!(b_pos.is_some(), "paying child selected");
    assert!(a_pos < b_pos, "parent precedes child");
    assert!(!order.contains(&c_id), "cheap sibling left out");
}

#[test]
fn priority_reservation_splits_the_block() {
    // Half the block is reserved for coin-age priority. The aged free
    // transactions must land in the front slice, fee payers after them.
    let node = RegtestNode::new();
    let value = 1000 * COIN;

    let free = spend(TxId([1; 32]), 0, value, 0);
    let free_id = free.id();
    node.mempool.add(free, 0, 1, 1e16, value).unwrap();

    let mut fee_ids = Vec::new();
    for n in 10..14u8 {
        let tx = spend(TxId([n; 32]), 0, value, 50_000);
        fee_ids.push(tx.id());
        node.mempool.add(tx, 50_000, 1, 0.0, 0).unwrap();
    }

    let config = AssemblerConfig {
        block_priority_percentage: 50,
        block_min_fee_rate: FeeRate::new(1000),
        ..Default::default()
    };
    let template = build(&node, config);
    let order: Vec<TxId> = template.block.txs.iter().map(|tx| tx.id()).collect();

    let free_pos = order.iter().position(|id| *id == free_id).unwrap();
    for fee_id in &fee_ids {
        let fee_pos = order.iter().position(|id| id == fee_id).unwrap();
        assert!(free_pos < fee_pos, "priority-sourced precedes fee-sourced");
    }
    // The free transaction could only have entered through the priority
    // reservation: it pays nothing.
    assert_eq!(template.tx_fees[free_pos], 0);
}

#[test]
fn coinbase_credits_fees_and_subsidy() {
    let node = RegtestNode::new();
    let value = 10 * COIN;
    node.mempool
        .add(spend(TxId([1; 32]), 0, value, 30_000), 30_000, 1, 0.0, value)
        .unwrap();
    node.mempool
        .add(spend(TxId([2; 32]), 0, value, 20_000), 20_000, 1, 0.0, value)
        .unwrap();

    let template = build(&node, fee_only(0));
    let subsidy = block_subsidy(1, &node.params.consensus);
    assert_eq!(template.block.txs[0].outputs[0].value, subsidy + 50_000);
    assert_eq!(template.tx_fees[0], -50_000);

    let from_vectors: Amount = template.tx_fees[1..].iter().sum();
    assert_eq!(from_vectors, 50_000);
}

#[test]
fn chain_interest_accumulates_from_deposits() {
    use platopia_consensus::{OutPoint, Script, Transaction, TxIn, TxOut};
    use std::sync::Arc;

    let node = RegtestNode::new();
    let value = 100 * COIN;
    let day = node.params.consensus.blocks_per_day;
    let deposit = Arc::new(Transaction::new(
        0,
        vec![TxIn::new(
            OutPoint::new(TxId([1; 32]), 0, value),
            Script::new(),
        )],
        vec![TxOut {
            value: 101 * COIN,
            principal: 100 * COIN,
            script_pubkey: Script::new(),
            content: String::new(),
            lock_time: 16 * day,
        }],
    ));
    node.mempool.add(deposit, 10_000, 1, 0.0, value).unwrap();

    let template = build(&node, fee_only(0));
    let genesis_interest = node.params.genesis_block().header.chain_interest;
    assert_eq!(
        template.block.header.chain_interest,
        genesis_interest + COIN as u64
    );
}

#[test]
fn identical_inputs_reproduce_identical_blocks() {
    let node = RegtestNode::new();
    for n in 1..=30u8 {
        let value = 5 * COIN + n as Amount;
        node.mempool
            .add(
                spend(TxId([n; 32]), 0, value, 100 + n as Amount),
                100 + n as Amount,
                1,
                n as f64 * 10.0,
                value,
            )
            .unwrap();
    }

    let config = AssemblerConfig {
        block_priority_percentage: 20,
        block_min_fee_rate: FeeRate::new(0),
        ..Default::default()
    };
    let first = build(&node, config.clone());
    let second = build(&node, config);
    let ids = |t: &BlockTemplate| t.block.txs.iter().map(|tx| tx.id()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.tx_fees, second.tx_fees);
    assert_eq!(first.tx_sigops, second.tx_sigops);
}

#[test]
fn every_included_ancestor_precedes_its_descendant() {
    let node = RegtestNode::new();
    let value = 100 * COIN;

    // A chain of five spends, inserted in reverse-fee order so the
    // selector has to reorder them.
    let mut prev = TxId([1; 32]);
    let mut amount = value;
    let mut chain_ids = Vec::new();
    let mut txs = Vec::new();
    for step in 0..5u32 {
        let fee = 1000 * (5 - step) as Amount;
        let tx = spend(prev, 0, amount, fee);
        prev = tx.id();
        amount -= fee;
        chain_ids.push(tx.id());
        txs.push(tx);
    }
    for (i, tx) in txs.into_iter().enumerate() {
        let fee = 1000 * (5 - i as u32) as Amount;
        node.mempool
            .add(tx, fee, 1, 0.0, if i == 0 { value } else { 0 })
            .unwrap();
    }

    let template = build(&node, fee_only(0));
    let order: Vec<TxId> = template.block.txs.iter().map(|tx| tx.id()).collect();
    for window in chain_ids.windows(2) {
        let parent_pos = order.iter().position(|id| *id == window[0]).unwrap();
        let child_pos = order.iter().position(|id| *id == window[1]).unwrap();
        assert!(parent_pos < child_pos);
    }
}

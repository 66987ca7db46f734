//! Four-validator cluster scenarios over the channel network: rotation commits blocks on
//! every node, the coin workload converges to identical balances, and every balance is
//! provable against each node's state tree.

mod common;

use std::thread;
use std::time::{Duration, Instant};

use kauri::types::keypair::Keypair;

use common::cluster::Cluster;
use common::coin_load::CoinLoad;

const COMMIT_TIMEOUT: Duration = Duration::from_secs(20);

#[test]
fn empty_blocks_commit_on_every_node() {
    let cluster = Cluster::start(4);

    // With no load, leaders keep proposing empty blocks; every node's committed height
    // should pass a small threshold.
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        let heights: Vec<u64> = cluster
            .nodes
            .iter()
            .map(|node| node.storage().get_block_height())
            .collect();
        if heights.iter().all(|height| *height >= 5) {
            break;
        }
        if Instant::now() > deadline {
            panic!("cluster failed to make progress: heights {:?}", heights);
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn coin_workload_converges_on_all_nodes() {
    let cluster = Cluster::start(4);
    let load = CoinLoad::deploy(&cluster);

    // Mint working accounts, one submission per node, concurrently. Mirrors a load
    // client fanning independent jobs out and joining on the first error.
    let mint_amount: i64 = 10_000_000_000;
    let accounts: Vec<Keypair> = (0..cluster.node_count()).map(|_| Keypair::generate()).collect();
    thread::scope(|scope| {
        let handles: Vec<_> = accounts
            .iter()
            .enumerate()
            .map(|(i, account)| {
                let tx = load.mint_tx(&account.public_bytes(), mint_amount);
                let cluster = &cluster;
                scope.spawn(move || {
                    cluster.submit(i, tx.clone())?;
                    cluster.wait_for_commit(i, &tx.hash, COMMIT_TIMEOUT);
                    Ok::<_, kauri::txpool::PoolError>(tx.hash)
                })
            })
            .collect();
        for handle in handles {
            let hash = handle.join().unwrap().unwrap();
            cluster.wait_all_committed(&hash, COMMIT_TIMEOUT);
        }
    });

    // A burst of transfers from each account to fresh recipients, spread over the nodes.
    let transfer_value: i64 = 1;
    let mut transfers = Vec::new();
    let recipient = Keypair::generate();
    for round in 0..5 {
        for (i, account) in accounts.iter().enumerate() {
            let tx = load.transfer_tx(account, &recipient.public_bytes(), transfer_value);
            let node = (round + i) % cluster.node_count();
            cluster.submit(node, tx.clone()).unwrap();
            cluster.wait_for_commit(node, &tx.hash, COMMIT_TIMEOUT);
            transfers.push(tx.hash);
        }
    }
    for hash in &transfers {
        cluster.wait_all_committed(hash, COMMIT_TIMEOUT);
    }

    // Every node answers with the same balances, and every balance is provable against
    // that node's own state tree.
    let spent = 5 * transfer_value;
    for index in 0..cluster.node_count() {
        for account in &accounts {
            assert_eq!(
                mint_amount - spent,
                load.query_balance(&cluster, index, &account.public_bytes())
            );
        }
        assert_eq!(
            spent * accounts.len() as i64,
            load.query_balance(&cluster, index, &recipient.public_bytes())
        );

        let storage = cluster.nodes[index].storage();
        let expected = (mint_amount - spent).to_be_bytes().to_vec();
        for account in &accounts {
            let proven = storage
                .verify_state(&load.balance_key(&account.public_bytes()))
                .unwrap();
            assert_eq!(expected, proven);
        }
    }
}

#[test]
fn duplicate_submission_is_rejected() {
    let cluster = Cluster::start(4);
    let load = CoinLoad::deploy(&cluster);

    let dest = Keypair::generate();
    let tx = load.mint_tx(&dest.public_bytes(), 5);
    cluster.submit(1, tx.clone()).unwrap();
    assert!(cluster.submit(1, tx.clone()).is_err());

    cluster.wait_for_commit(1, &tx.hash, COMMIT_TIMEOUT);
    // Still a duplicate after commit.
    assert!(cluster.submit(1, tx).is_err());
}

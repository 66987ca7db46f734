//! A local in-process cluster of nodes over the channel network.

use std::time::{Duration, Instant};

use log::LevelFilter;

use kauri::config::Config;
use kauri::node::Node;
use kauri::state::MemStore;
use kauri::txpool::{PoolError, TxStatus};
use kauri::types::basic::CryptoHash;
use kauri::types::keypair::Keypair;
use kauri::types::transaction::Transaction;

use super::logging::setup_logger;
use super::network::{mock_network, NetworkStub};

const POLL: Duration = Duration::from_millis(50);

pub struct Cluster {
    pub keys: Vec<Keypair>,
    pub nodes: Vec<Node<MemStore, NetworkStub>>,
}

impl Cluster {
    /// Start `n` connected validators with in-memory storage.
    pub fn start(n: usize) -> Cluster {
        setup_logger(LevelFilter::Info);

        let keys: Vec<Keypair> = (0..n).map(|_| Keypair::generate()).collect();
        let pubkeys: Vec<Vec<u8>> = keys.iter().map(|key| key.public_bytes()).collect();
        let networks = mock_network(&pubkeys);

        let nodes = keys
            .iter()
            .zip(networks)
            .map(|(key, network)| {
                let mut config = Config::new(key.clone(), pubkeys.clone());
                config.driver.view_timeout = Duration::from_secs(2);
                config.driver.proposal_interval = Duration::from_millis(10);
                Node::start(config, network, MemStore::new()).unwrap()
            })
            .collect();

        Cluster { keys, nodes }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Submit `tx` through node `index`, as a client would.
    pub fn submit(&self, index: usize, tx: Transaction) -> Result<(), PoolError> {
        self.nodes[index].services().submit_transaction(tx)
    }

    /// Poll node `index` until `tx_hash` reports committed.
    ///
    /// Panics after `timeout`, mirroring how a load client would give up.
    pub fn wait_for_commit(&self, index: usize, tx_hash: &CryptoHash, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        loop {
            match self.nodes[index].services().tx_status(tx_hash) {
                TxStatus::Committed => return,
                TxStatus::NotFound => panic!("submitted tx reported not found"),
                _ => (),
            }
            if Instant::now() > deadline {
                panic!("tx {} not committed within {:?}", tx_hash, timeout);
            }
            std::thread::sleep(POLL);
        }
    }

    /// Wait until every node has a commit record for `tx_hash`.
    pub fn wait_all_committed(&self, tx_hash: &CryptoHash, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        for node in &self.nodes {
            loop {
                if node
                    .storage()
                    .get_tx_commit(tx_hash)
                    .unwrap()
                    .is_some()
                {
                    break;
                }
                if Instant::now() > deadline {
                    panic!("tx {} not committed on all nodes within {:?}", tx_hash, timeout);
                }
                std::thread::sleep(POLL);
            }
        }
    }
}

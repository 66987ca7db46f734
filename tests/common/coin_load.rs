//! A coin-chaincode load client for the cluster tests: deploys the contract, mints
//! accounts, and builds transfer transactions.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use kauri::execution::{coin, CodeInfo, DeploymentInput, DRIVER_TYPE_NATIVE};
use kauri::types::keypair::Keypair;
use kauri::types::transaction::Transaction;

use super::cluster::Cluster;

const COMMIT_TIMEOUT: Duration = Duration::from_secs(20);

static NONCE: AtomicI64 = AtomicI64::new(1);

fn next_nonce() -> i64 {
    NONCE.fetch_add(1, Ordering::Relaxed)
}

pub struct CoinLoad {
    pub minter: Keypair,
    pub code_addr: Vec<u8>,
}

impl CoinLoad {
    /// Deploy the coin chaincode through node 0 and wait for the deployment to commit.
    pub fn deploy(cluster: &Cluster) -> CoinLoad {
        let minter = Keypair::generate();
        let input = serde_json::to_vec(&DeploymentInput {
            code_info: CodeInfo {
                driver_type: DRIVER_TYPE_NATIVE,
                code_id: coin::CODE_ID.to_vec(),
            },
        })
        .unwrap();
        let tx = Transaction::new(next_nonce(), Vec::new(), input, &minter);
        cluster.submit(0, tx.clone()).unwrap();
        cluster.wait_for_commit(0, &tx.hash, COMMIT_TIMEOUT);
        CoinLoad {
            minter,
            code_addr: tx.hash.bytes().to_vec(),
        }
    }

    pub fn mint_tx(&self, dest: &[u8], value: i64) -> Transaction {
        self.coin_tx("mint", dest, value, &self.minter)
    }

    pub fn transfer_tx(&self, from: &Keypair, dest: &[u8], value: i64) -> Transaction {
        self.coin_tx("transfer", dest, value, from)
    }

    /// The world-state key holding `account`'s balance: chaincode keys are scoped by the
    /// code address.
    pub fn balance_key(&self, account: &[u8]) -> Vec<u8> {
        let mut key = self.code_addr.clone();
        key.extend_from_slice(account);
        key
    }

    /// Query `account`'s balance through node `index`.
    pub fn query_balance(&self, cluster: &Cluster, index: usize, account: &[u8]) -> i64 {
        let input = serde_json::to_vec(&coin::Input {
            method: String::from("balance"),
            dest: account.to_vec(),
            value: 0,
        })
        .unwrap();
        let result = cluster.nodes[index]
            .services()
            .query_state(&self.code_addr, &input)
            .unwrap();
        serde_json::from_slice(&result).unwrap()
    }

    fn coin_tx(&self, method: &str, dest: &[u8], value: i64, signer: &Keypair) -> Transaction {
        let input = serde_json::to_vec(&coin::Input {
            method: method.to_string(),
            dest: dest.to_vec(),
            value,
        })
        .unwrap();
        Transaction::new(next_nonce(), self.code_addr.clone(), input, signer)
    }
}

/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Node orchestration: wiring storage, the pool, the executor, and the consensus driver to
//! the transport and the HTTP surface.

pub mod api;

use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::Config;
use crate::execution::{ExecutionError, Executor};
use crate::hotstuff::{start_driver, Driver, Envelope};
use crate::logging::short_hash;
use crate::networking::Network;
use crate::state::{KVStore, Storage, StorageError};
use crate::txpool::{PoolError, TxPool, TxStatus};
use crate::types::basic::CryptoHash;
use crate::types::block::Block;
use crate::types::transaction::{Transaction, TxList};

/// The client-facing capabilities of a running node, shared between the HTTP handlers and
/// embedding code.
pub struct NodeServices<K: KVStore, N: Network> {
    storage: Arc<Storage<K>>,
    pool: Arc<TxPool<K>>,
    executor: Executor<K>,
    network: Mutex<N>,
}

impl<K: KVStore, N: Network> NodeServices<K, N> {
    /// Accept a transaction into the pool and relay it to the other replicas.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<(), PoolError> {
        self.pool.submit(tx.clone())?;
        log::debug!("accepted transaction, tx: {}", short_hash(&tx.hash.bytes()));
        self.network
            .lock()
            .unwrap()
            .broadcast(Envelope::TxList(TxList::new(vec![tx])));
        Ok(())
    }

    pub fn tx_status(&self, hash: &CryptoHash) -> TxStatus {
        self.pool.get_status(hash)
    }

    /// Run a read-only chaincode query against committed state.
    pub fn query_state(&self, code_addr: &[u8], input: &[u8]) -> Result<Vec<u8>, ExecutionError> {
        self.executor.query(code_addr, input)
    }

    pub fn storage(&self) -> &Arc<Storage<K>> {
        &self.storage
    }

    pub fn pool(&self) -> &Arc<TxPool<K>> {
        &self.pool
    }
}

/// A running replica. Dropping it shuts the replica down: the API first, then the driver
/// (letting an in-flight commit finish), then the transport poller.
pub struct Node<K: KVStore, N: Network> {
    services: Arc<NodeServices<K, N>>,
    api: Option<api::ApiServer>,
    driver: Option<JoinHandle<()>>,
    driver_shutdown: Sender<()>,
    poller: Option<JoinHandle<()>>,
    poller_shutdown: Sender<()>,
}

impl<K: KVStore, N: Network> Node<K, N> {
    /// Open storage (committing the genesis block on first run), start the consensus
    /// driver and the transport poller, and expose the HTTP API if configured.
    pub fn start(config: Config, network: N, kv: K) -> Result<Node<K, N>, StorageError> {
        let storage = Arc::new(Storage::new(kv, config.storage));
        if !storage.is_initialized() {
            storage.commit_genesis(&Block::genesis())?;
            log::info!("initialized chain with genesis block");
        }
        let pool = Arc::new(TxPool::new(storage.clone()));
        let validators = crate::types::validator_set::ValidatorSet::new(config.validators.clone());

        let driver = Driver::new(
            config.keypair.clone(),
            validators,
            config.driver,
            storage.clone(),
            pool.clone(),
            Executor::new(storage.clone()),
            network.clone(),
        )?;
        let (inbox, driver_inbox) = mpsc::sync_channel(config.msg_buffer_capacity);
        let (driver_shutdown, driver_shutdown_receiver) = mpsc::channel();
        let driver = start_driver(driver, driver_inbox, driver_shutdown_receiver);

        let (poller_shutdown, poller_shutdown_receiver) = mpsc::channel();
        let poller = start_poller(
            network.clone(),
            pool.clone(),
            inbox,
            poller_shutdown_receiver,
        );

        let services = Arc::new(NodeServices {
            storage: storage.clone(),
            pool,
            executor: Executor::new(storage),
            network: Mutex::new(network),
        });
        let api = config
            .api_port
            .map(|port| api::ApiServer::start(services.clone(), port));

        Ok(Node {
            services,
            api,
            driver: Some(driver),
            driver_shutdown,
            poller: Some(poller),
            poller_shutdown,
        })
    }

    pub fn services(&self) -> &Arc<NodeServices<K, N>> {
        &self.services
    }

    pub fn storage(&self) -> &Arc<Storage<K>> {
        self.services.storage()
    }
}

impl<K: KVStore, N: Network> Drop for Node<K, N> {
    fn drop(&mut self) {
        // The API only reads through services, so it goes first; the driver is next so its
        // current commit finishes before the poller that feeds it disappears.
        self.api.take();

        let _ = self.driver_shutdown.send(());
        if let Some(driver) = self.driver.take() {
            let _ = driver.join();
        }

        let _ = self.poller_shutdown.send(());
        if let Some(poller) = self.poller.take() {
            let _ = poller.join();
        }
    }
}

// Pump inbound messages: transaction relays go straight to the pool, consensus messages to
// the driver. When the driver's bounded channel overflows, proposals wait and everything
// else is shed.
fn start_poller<K: KVStore, N: Network>(
    mut network: N,
    pool: Arc<TxPool<K>>,
    inbox: SyncSender<(Vec<u8>, Envelope)>,
    shutdown: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => (),
        }
        match network.recv() {
            Some((_, Envelope::TxList(txs))) => pool.add_from_peer(txs.0),
            Some((origin, envelope)) => {
                let is_proposal = matches!(envelope, Envelope::Proposal(_));
                match inbox.try_send((origin, envelope)) {
                    Ok(()) => (),
                    Err(TrySendError::Full(message)) if is_proposal => {
                        if inbox.send(message).is_err() {
                            return;
                        }
                    }
                    Err(TrySendError::Full(_)) => {
                        log::debug!("driver inbox full, dropping message");
                    }
                    Err(TrySendError::Disconnected(_)) => return,
                }
            }
            None => thread::sleep(Duration::from_millis(1)),
        }
    })
}

/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration as specified by the operator. This is split up into smaller, subsystem
//! specific config structs before being passed to components.

use std::path::PathBuf;

use crate::hotstuff::DriverConfig;
use crate::state::StorageConfig;
use crate::types::keypair::Keypair;

#[derive(Clone)]
pub struct Config {
    /// This replica's signing identity.
    pub keypair: Keypair,
    /// The public keys of all validators, in rotation order. Must be identical on every
    /// replica.
    pub validators: Vec<Vec<u8>>,
    pub storage: StorageConfig,
    pub driver: DriverConfig,
    /// Where the embedded database lives.
    pub data_dir: PathBuf,
    /// Port for the HTTP API; `None` disables it.
    pub api_port: Option<u16>,
    /// Port the peer transport listens on. Consumed by the transport implementation, not
    /// by the core.
    pub peer_port: u16,
    /// Capacity of the driver's inbound message channel.
    pub msg_buffer_capacity: usize,
}

impl Config {
    /// A configuration with default tuning for the given identity and validator set.
    pub fn new(keypair: Keypair, validators: Vec<Vec<u8>>) -> Config {
        Config {
            keypair,
            validators,
            storage: StorageConfig::default(),
            driver: DriverConfig::default(),
            data_dir: PathBuf::from("data"),
            api_port: None,
            peer_port: 0,
            msg_buffer_capacity: 1024,
        }
    }
}

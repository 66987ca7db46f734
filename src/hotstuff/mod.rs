/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The three-chain HotStuff consensus protocol.
//!
//! A single [`driver::Driver`] thread per replica serializes every consensus state
//! transition: it handles proposals, votes, and new-view messages from the inbound channel,
//! runs the pacemaker between messages, and commits blocks through the storage layer once
//! the three-chain rule fires.

pub mod driver;

pub mod messages;

pub mod pacemaker;

pub mod voting;

pub use driver::{start_driver, Driver, DriverConfig, DriverError};
pub use messages::Envelope;

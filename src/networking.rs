/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The transport capability.
//!
//! The core does not own a transport. Library users provide an implementation of
//! [`Network`] that connects the replica to its peers over whatever stream transport they
//! run; the test suites provide a channel-backed one. Peers are addressed by their public
//! key bytes. Outbound sends should carry their own deadlines inside the implementation;
//! the consensus layer never blocks on them.

use crate::hotstuff::messages::Envelope;

/// A handle to the inter-replica transport. Cloned into every thread that sends; one clone
/// is polled for inbound messages by the node's poller thread.
pub trait Network: Clone + Send + 'static {
    /// Send `message` to the peer identified by `peer` public key bytes. Best-effort.
    fn send(&mut self, peer: &[u8], message: Envelope);

    /// Send `message` to every connected peer. Best-effort.
    fn broadcast(&mut self, message: Envelope);

    /// The next inbound message, as `(origin public key, message)`, if one is ready.
    /// Must not block.
    fn recv(&mut self) -> Option<(Vec<u8>, Envelope)>;
}

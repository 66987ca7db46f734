/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The messages replicas exchange.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::block::Block;
use crate::types::quorum_cert::{QuorumCert, Vote};
use crate::types::transaction::TxList;

/// One inter-replica message. Serialized with Borsh: a type tag followed by the canonical
/// encoding of the body.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Envelope {
    /// A leader's proposal, broadcast to all replicas.
    Proposal(Block),
    /// A replica's vote, sent to the leader of the next view.
    Vote(Vote),
    /// A pacemaker timeout: the sender's highest certificate, sent to the next leader.
    NewView(QuorumCert),
    /// Transaction bodies, broadcast so voters can execute what a proposal references.
    TxList(TxList),
}

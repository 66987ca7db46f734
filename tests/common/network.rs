//! A "mock" (totally local) network for passing envelopes between in-process nodes.

use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use kauri::hotstuff::Envelope;
use kauri::networking::Network;

/// A network stub that passes messages to and from nodes using channels.
///
/// The set of reachable peers is fixed on construction by [`mock_network`]; delivery is
/// reliable and unbounded, which is exactly the synchronous setting the cluster tests
/// assume.
#[derive(Clone)]
pub struct NetworkStub {
    my_pubkey: Vec<u8>,
    all_peers: HashMap<Vec<u8>, Sender<(Vec<u8>, Envelope)>>,
    inbox: Arc<Mutex<Receiver<(Vec<u8>, Envelope)>>>,
}

impl Network for NetworkStub {
    fn send(&mut self, peer: &[u8], message: Envelope) {
        if let Some(peer) = self.all_peers.get(peer) {
            let _ = peer.send((self.my_pubkey.clone(), message));
        }
    }

    fn broadcast(&mut self, message: Envelope) {
        for (peer, sender) in &self.all_peers {
            // The driver handles its own messages directly; no loopback.
            if peer != &self.my_pubkey {
                let _ = sender.send((self.my_pubkey.clone(), message.clone()));
            }
        }
    }

    fn recv(&mut self) -> Option<(Vec<u8>, Envelope)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Create connected `NetworkStub`s for `peers`, in the same order.
pub fn mock_network(peers: &[Vec<u8>]) -> Vec<NetworkStub> {
    let mut all_peers = HashMap::new();
    let peers_and_inboxes: Vec<(Vec<u8>, Receiver<(Vec<u8>, Envelope)>)> = peers
        .iter()
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer.clone(), sender);
            (peer.clone(), receiver)
        })
        .collect();

    peers_and_inboxes
        .into_iter()
        .map(|(my_pubkey, inbox)| NetworkStub {
            my_pubkey,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
        })
        .collect()
}

mod peer;

pub use peer::{EnqueueStatus, Peer, Rx, Tx};

use crate::{config::PEER_MAX_COUNT, p2p::error::P2pError};
use arcadia_common::crypto::Hash;
use log::{debug, info};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::RwLock;

pub type SharedPeerList = Arc<PeerList>;

// Registry of live peers, indexed by local id with a node-id index for
// duplicate detection. Owned by the server; peers never reference it back.
pub struct PeerList {
    peers: RwLock<HashMap<u64, Arc<Peer>>>,
    id_counter: AtomicU64,
}

impl PeerList {
    pub fn new() -> SharedPeerList {
        Arc::new(Self {
            peers: RwLock::new(HashMap::new()),
            id_counter: AtomicU64::new(0),
        })
    }

    pub fn next_peer_id(&self) -> u64 {
        self.id_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub async fn size(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_full(&self) -> bool {
        self.size().await >= PEER_MAX_COUNT
    }

    // Another live connection to the same node makes the new one a
    // duplicate
    pub async fn has_node_id(&self, node_id: &Hash) -> bool {
        self.peers
            .read()
            .await
            .values()
            .any(|peer| peer.get_node_id() == node_id)
    }

    pub async fn add_peer(&self, peer: Arc<Peer>) -> Result<(), P2pError> {
        let mut peers = self.peers.write().await;
        if peers.len() >= PEER_MAX_COUNT {
            return Err(P2pError::PeerLimitReached(PEER_MAX_COUNT));
        }
        info!("new peer connected: {}", peer);
        peers.insert(peer.get_id(), peer);
        Ok(())
    }

    pub async fn remove_peer(&self, id: u64) -> Option<Arc<Peer>> {
        let peer = self.peers.write().await.remove(&id);
        if let Some(peer) = &peer {
            debug!("removed peer {}", peer);
            peer.signal_exit();
        }
        peer
    }

    pub async fn get_peer(&self, id: u64) -> Option<Arc<Peer>> {
        self.peers.read().await.get(&id).cloned()
    }

    // Snapshot of all peers for iteration without holding the lock
    pub async fn get_cloned_peers(&self) -> Vec<Arc<Peer>> {
        self.peers.read().await.values().cloned().collect()
    }

    // Match an endpoint against the socket address or the advertised
    // p2p address
    pub async fn find_by_endpoint(&self, endpoint: &str) -> Option<Arc<Peer>> {
        self.peers
            .read()
            .await
            .values()
            .find(|peer| {
                peer.get_connection().get_address().to_string() == endpoint
                    || peer.get_p2p_address() == endpoint
            })
            .cloned()
    }

    pub async fn close_all(&self) {
        let peers: Vec<_> = {
            let mut peers = self.peers.write().await;
            peers.drain().map(|(_, peer)| peer).collect()
        };
        for peer in peers {
            if let Err(e) = peer.close().await {
                debug!("error while closing {}: {}", peer, e);
            }
        }
    }
}

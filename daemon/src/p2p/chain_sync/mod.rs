mod controller;

pub use controller::{Assignment, BlockProgress, Chunk, PeerCandidate, SyncController};

use crate::{
    core::{BlockError, ChainController},
    p2p::{
        error::P2pError,
        packet::{Packet, SyncRequest},
        peer_list::Peer,
        P2pServer,
    },
};
use arcadia_common::{
    api::daemon::Direction,
    block::SignedBlock,
    time::get_current_time_in_millis,
};
use log::{debug, info, warn};
use metrics::counter;
use std::{borrow::Cow, sync::Arc, time::Instant};

// Blocks from parallel chunks can outrun the chain tip; they wait here
// until their predecessor lands. Bounded so a hostile peer cannot grow it.
const SYNC_REORDER_BUFFER_MAX: usize = 4_096;

impl<C: ChainController> P2pServer<C> {
    // Reevaluate the sync trigger against one peer's stated chain state
    pub(in crate::p2p) async fn maybe_enter_sync(self: &Arc<Self>, peer: &Arc<Peer>) {
        let peer_lib = peer.get_lib_num();
        let head = self.chain.head_num();
        let head_time = self.chain.head_block_time();
        let now = get_current_time_in_millis();

        if !SyncController::should_sync(head, head_time, now, peer_lib) {
            return;
        }
        {
            let mut sync = self.sync.lock().await;
            sync.start(head, peer_lib);
        }
        self.drive_sync().await;
    }

    // Hand out as many chunks as the in-flight policy allows right now
    pub(in crate::p2p) async fn drive_sync(self: &Arc<Self>) {
        let peers = self.peer_list.get_cloned_peers().await;
        let assignments = {
            let mut sync = self.sync.lock().await;
            if !sync.is_active() {
                return;
            }
            let candidates: Vec<PeerCandidate> = peers
                .iter()
                .map(|peer| PeerCandidate {
                    id: peer.get_id(),
                    lib_num: peer.get_lib_num(),
                    rtt_ns: peer.get_rtt_ns(),
                })
                .collect();
            sync.schedule(&candidates, Instant::now())
        };

        for assignment in assignments {
            let Some(peer) = peers.iter().find(|p| p.get_id() == assignment.peer_id) else {
                continue;
            };
            let request = SyncRequest::new(assignment.chunk.start, assignment.chunk.end);
            debug!("assigning {} to {}", request, peer);
            peer.set_syncing(true);
            counter!("arcadia_p2p_sync_chunks_assigned").increment(1u64);
            if let Err(e) = peer
                .send_packet(Packet::SyncRequest(Cow::Owned(request)))
                .await
            {
                warn!("failed to send {} to {}: {}", request, peer, e);
                peer.increment_fail_count();
                let mut sync = self.sync.lock().await;
                sync.on_peer_failed(peer.get_id(), Instant::now());
            }
        }
    }

    // Driven by the maintenance loop: requeue stalled chunks, keep the
    // pipeline full, detect completion
    pub(in crate::p2p) async fn sync_tick(self: &Arc<Self>) {
        let requeued = {
            let mut sync = self.sync.lock().await;
            if !sync.is_active() {
                return;
            }
            sync.on_tick(Instant::now())
        };
        if requeued > 0 {
            counter!("arcadia_p2p_sync_chunks_requeued").increment(requeued as u64);
        }
        self.drive_sync().await;
        self.check_sync_complete().await;
    }

    // On completion: reset peer states and advertise the new chain size
    // to the whole cluster
    pub(in crate::p2p) async fn check_sync_complete(self: &Arc<Self>) {
        let head = self.chain.head_num();
        let completed = {
            let mut sync = self.sync.lock().await;
            sync.try_complete(head)
        };
        if !completed {
            return;
        }

        self.sync_buffer.lock().await.clear();
        let chain_size = self.build_chain_size();
        info!("sync finished, broadcasting chain size at head {}", head);
        for peer in self.peer_list.get_cloned_peers().await {
            peer.set_syncing(false);
            peer.set_needs_chain_size(false);
            let packet = Packet::ChainSize(Cow::Borrowed(&chain_size));
            if let Err(e) = peer.try_enqueue_packet(packet) {
                debug!("failed to send chain size to {}: {}", peer, e);
            }
        }
    }

    // An inbound block payload, during normal gossip or a sync stream
    pub(in crate::p2p) async fn handle_block(
        self: &Arc<Self>,
        peer: &Arc<Peer>,
        block: SignedBlock,
    ) -> Result<(), P2pError> {
        let id = block.id();
        let num = block.num();
        peer.track_block(id.clone(), Direction::In).await;
        // the sender evidently holds this block
        if num > peer.get_head_num() {
            peer.set_head(num, id.clone()).await;
        }

        let (sync_active, progress) = {
            let mut sync = self.sync.lock().await;
            if sync.is_active() {
                (true, sync.on_block(peer.get_id(), num, Instant::now()))
            } else {
                (false, BlockProgress::Unsolicited)
            }
        };

        // already processed, e.g. by a requeued chunk or another peer's
        // relay: only the knowledge and progress tracking above matter
        if !self.dispatcher.has_block(&id).await {
            match self.chain.accept_block(block.clone()).await {
                Ok(()) => {
                    counter!("arcadia_p2p_block_received").increment(1u64);
                    let registered = self.dispatcher.on_accepted_block(block).await;
                    // relay only outside of sync: lagging nodes pull ranges
                    // instead of replaying our gossip
                    if !sync_active {
                        if let Some(block) = registered {
                            self.broadcast_block(&block, Some(peer)).await;
                        }
                    }
                    self.drain_sync_buffer().await?;
                }
                Err(BlockError::Unlinkable) if sync_active && num > self.chain.head_num() + 1 => {
                    // a parallel chunk got ahead of the chain tip
                    let mut buffer = self.sync_buffer.lock().await;
                    if buffer.len() < SYNC_REORDER_BUFFER_MAX {
                        buffer.insert(num, block);
                    } else if log::log_enabled!(log::Level::Debug) {
                        debug!("sync reorder buffer full, dropping block {}", num);
                    }
                }
                Err(e) => return Err(P2pError::BlockRejected(e)),
            }
        }

        if progress == BlockProgress::ChunkComplete {
            let peer_done = {
                let sync = self.sync.lock().await;
                sync.peer_in_flight(peer.get_id()) == 0
            };
            if peer_done {
                peer.set_syncing(false);
            }
            self.drive_sync().await;
            self.check_sync_complete().await;
        }
        Ok(())
    }

    // Apply buffered successors that became linkable
    async fn drain_sync_buffer(&self) -> Result<(), P2pError> {
        let mut buffer = self.sync_buffer.lock().await;
        loop {
            let next = self.chain.head_num() + 1;
            let Some(block) = buffer.remove(&next) else {
                break;
            };
            match self.chain.accept_block(block.clone()).await {
                Ok(()) => {
                    self.dispatcher.on_accepted_block(block).await;
                }
                Err(BlockError::Unlinkable) => {
                    // still not linkable: put it back and wait
                    buffer.insert(next, block);
                    break;
                }
                Err(e) => return Err(P2pError::BlockRejected(e)),
            }
        }
        Ok(())
    }
}

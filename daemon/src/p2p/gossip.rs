use crate::{
    config::PAYLOAD_RELAY_THRESHOLD,
    core::ChainController,
    p2p::{
        error::P2pError,
        packet::{IdListMode, Notice, Packet, Request, SelectIds},
        peer_list::Peer,
        P2pServer,
    },
};
use arcadia_common::{
    api::daemon::Direction, block::SignedBlock, serializer::Serializer,
    transaction::PackedTransaction,
};
use indexmap::IndexSet;
use log::{debug, trace, warn};
use metrics::counter;
use std::{borrow::Cow, sync::Arc};

// How a payload reaches one peer
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RelayAction {
    // small enough and the peer can absorb it
    Payload,
    // oversized or the peer's queue is above the watermark
    Notice,
    // the peer already knows the id
    Skip,
}

// Per-peer relay decision. Payloads above 3x MTU always travel as a
// notice; a saturated mailbox degrades the rest.
pub fn relay_action(payload_size: usize, peer_knows: bool, saturated: bool) -> RelayAction {
    if peer_knows {
        RelayAction::Skip
    } else if payload_size > PAYLOAD_RELAY_THRESHOLD || saturated {
        RelayAction::Notice
    } else {
        RelayAction::Payload
    }
}

impl<C: ChainController> P2pServer<C> {
    // Fan a transaction out to every peer that does not know it yet.
    // `from` is the peer it came from and is never echoed to.
    pub(in crate::p2p) async fn broadcast_transaction(
        self: &Arc<Self>,
        tx: &Arc<PackedTransaction>,
        from: Option<&Arc<Peer>>,
    ) {
        let id = tx.id();
        let size = tx.size();
        for peer in self.peer_list.get_cloned_peers().await {
            if let Some(origin) = from {
                if peer.get_id() == origin.get_id() {
                    continue;
                }
            }
            // peers serving us sync ranges get sync traffic only
            if peer.is_syncing() {
                continue;
            }

            let action = relay_action(size, peer.knows_tx(&id).await, peer.is_saturated());
            let packet = match action {
                RelayAction::Skip => continue,
                RelayAction::Payload => Packet::Transaction(Cow::Borrowed(tx.as_ref())),
                RelayAction::Notice => {
                    let mut ids = IndexSet::new();
                    ids.insert(id.clone());
                    Packet::Notice(Cow::Owned(Notice::transactions(SelectIds::normal(ids))))
                }
            };

            peer.track_tx(id.clone(), Direction::Out).await;
            if let Err(e) = peer.try_enqueue_packet(packet) {
                warn!("failed to relay transaction to {}: {}", peer, e);
                self.handle_peer_error(&peer, e).await;
                peer.signal_exit();
                continue;
            }
            counter!("arcadia_p2p_tx_relayed").increment(1u64);
        }
    }

    // Fan a block out. Peers that are more than one block behind are left
    // to the sync controller and only get a chain-size refresh.
    pub(in crate::p2p) async fn broadcast_block(
        self: &Arc<Self>,
        block: &Arc<SignedBlock>,
        from: Option<&Arc<Peer>>,
    ) {
        let id = block.id();
        let num = block.num();
        let size = block.size();
        let chain_size = self.build_chain_size();

        for peer in self.peer_list.get_cloned_peers().await {
            if let Some(origin) = from {
                if peer.get_id() == origin.get_id() {
                    continue;
                }
            }
            if peer.is_syncing() {
                continue;
            }

            // lagging peer: it will catch up through sync, tell it where
            // the chain is instead
            if peer.get_head_num() + 1 < num {
                if peer.needs_chain_size() {
                    peer.set_needs_chain_size(false);
                    let packet = Packet::ChainSize(Cow::Borrowed(&chain_size));
                    if let Err(e) = peer.try_enqueue_packet(packet) {
                        debug!("failed to send chain size to {}: {}", peer, e);
                    }
                }
                continue;
            }

            let action = relay_action(size, peer.knows_block(&id).await, peer.is_saturated());
            let packet = match action {
                RelayAction::Skip => continue,
                RelayAction::Payload => Packet::Block(Cow::Borrowed(block.as_ref())),
                RelayAction::Notice => {
                    let mut ids = IndexSet::new();
                    ids.insert(id.clone());
                    Packet::Notice(Cow::Owned(Notice::blocks(SelectIds::normal(ids))))
                }
            };

            peer.track_block(id.clone(), Direction::Out).await;
            if let Err(e) = peer.try_enqueue_packet(packet) {
                warn!("failed to relay block to {}: {}", peer, e);
                self.handle_peer_error(&peer, e).await;
                peer.signal_exit();
                continue;
            }
            // the peer will hold this block in a moment: advance its
            // recorded head so the next block is not wrongly deferred
            if action == RelayAction::Payload && num > peer.get_head_num() {
                peer.set_head(num, id.clone()).await;
            }
            counter!("arcadia_p2p_block_relayed").increment(1u64);
        }
    }

    // A notice advertises ids the peer holds. Catch-up modes steer the
    // sync controller; normal mode drives requests for unknown payloads.
    pub(in crate::p2p) async fn handle_notice(
        self: &Arc<Self>,
        peer: &Arc<Peer>,
        notice: Notice,
    ) -> Result<(), P2pError> {
        let mut wanted_trx = IndexSet::new();
        if !notice.known_trx.empty() {
            for id in &notice.known_trx.ids {
                peer.track_tx(id.clone(), Direction::In).await;
                if notice.known_trx.mode == IdListMode::Normal
                    && !self.dispatcher.has_txn(id).await
                {
                    wanted_trx.insert(id.clone());
                }
            }
        }

        let mut wanted_blocks = IndexSet::new();
        if !notice.known_blocks.empty() {
            for id in &notice.known_blocks.ids {
                peer.track_block(id.clone(), Direction::In).await;
                if notice.known_blocks.mode == IdListMode::Normal
                    && !self.dispatcher.has_block(id).await
                    && self.chain.block_by_id(id).await.is_none()
                {
                    wanted_blocks.insert(id.clone());
                }
            }
        }

        // a catch-up notice means the peer's chain state moved: let the
        // sync controller reevaluate
        if notice.known_trx.mode.is_catch_up() || notice.known_blocks.mode.is_catch_up() {
            self.maybe_enter_sync(peer).await;
        }

        if !wanted_trx.is_empty() || !wanted_blocks.is_empty() {
            if log::log_enabled!(log::Level::Trace) {
                trace!(
                    "requesting {} transactions and {} blocks from {}",
                    wanted_trx.len(),
                    wanted_blocks.len(),
                    peer
                );
            }
            let request = Request {
                req_trx: if wanted_trx.is_empty() {
                    SelectIds::default()
                } else {
                    SelectIds::normal(wanted_trx)
                },
                req_blocks: if wanted_blocks.is_empty() {
                    SelectIds::default()
                } else {
                    SelectIds::normal(wanted_blocks)
                },
            };
            peer.send_packet(Packet::Request(Cow::Owned(request))).await?;
        }
        Ok(())
    }

    // Serve the payloads we hold; unknown ids are silently skipped
    pub(in crate::p2p) async fn handle_request(
        &self,
        peer: &Arc<Peer>,
        request: Request,
    ) -> Result<(), P2pError> {
        if !request.req_trx.empty() {
            for id in &request.req_trx.ids {
                let Some(tx) = self.dispatcher.lookup_txn(id).await else {
                    continue;
                };
                peer.track_tx(id.clone(), Direction::Out).await;
                peer.send_packet(Packet::Transaction(Cow::Borrowed(tx.as_ref())))
                    .await?;
            }
        }

        if !request.req_blocks.empty() {
            for id in &request.req_blocks.ids {
                let block = match self.dispatcher.lookup_block(id).await {
                    Some(block) => block,
                    None => match self.chain.block_by_id(id).await {
                        Some(block) => Arc::new(block),
                        None => continue,
                    },
                };
                peer.track_block(id.clone(), Direction::Out).await;
                peer.send_packet(Packet::Block(Cow::Borrowed(block.as_ref())))
                    .await?;
            }
        }
        Ok(())
    }

    // An inbound transaction payload: de-duplicate, validate, relay
    pub(in crate::p2p) async fn handle_transaction(
        self: &Arc<Self>,
        peer: &Arc<Peer>,
        tx: PackedTransaction,
    ) -> Result<(), P2pError> {
        let id = tx.id();
        peer.track_tx(id.clone(), Direction::In).await;

        // already processed: never reprocess or re-relay
        let Some(tx) = self.dispatcher.on_accepted_transaction(tx).await else {
            return Ok(());
        };
        counter!("arcadia_p2p_tx_received").increment(1u64);

        self.chain
            .accept_transaction(tx.as_ref().clone())
            .await
            .map_err(P2pError::TransactionRejected)?;

        self.broadcast_transaction(&tx, Some(peer)).await;
        Ok(())
    }
}

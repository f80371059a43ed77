use crate::{
    config::{
        PEER_BLOCK_CACHE_SIZE, PEER_FAIL_TIME_RESET_SECS, PEER_PACKET_CHANNEL_SIZE,
        PEER_QUEUE_HIGH_WATERMARK, PEER_TX_CACHE_SIZE,
    },
    p2p::{
        connection::{Connection, State},
        error::P2pError,
        packet::{Handshake, Packet, TimeMessage},
    },
};
use arcadia_common::{
    api::daemon::Direction,
    block::BlockNum,
    crypto::Hash,
    serializer::Serializer,
    time::{get_current_time_in_seconds, TimestampNanos, TimestampSeconds},
};
use bytes::Bytes;
use log::{trace, warn};
use lru::LruCache;
use std::{
    fmt::{Display, Error, Formatter},
    num::NonZeroUsize,
    sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering},
};
use tokio::sync::{broadcast, mpsc, Mutex};

// Compile-time validation that the cache constants are non-zero so the
// NonZeroUsize conversions below cannot fail
const _: () = assert!(PEER_TX_CACHE_SIZE > 0);
const _: () = assert!(PEER_BLOCK_CACHE_SIZE > 0);

pub type Tx = mpsc::Sender<Bytes>;
pub type Rx = mpsc::Receiver<Bytes>;

// Result of queueing a frame for the write task
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EnqueueStatus {
    Sent,
    // Above the high watermark: delivered, but senders should degrade
    // payloads to notices
    Saturated,
}

// One remote node. Owns the connection, the outbound mailbox feeding the
// write task and the knowledge caches used for relay decisions.
pub struct Peer {
    connection: Connection,
    // unique ID of the peer to recognize it
    id: u64,
    // node identity stated in the validated handshake
    node_id: Hash,
    network_version: u16,
    p2p_address: String,
    // last validated handshake, kept for the status API
    last_handshake: Mutex<Handshake>,
    // chain position, refreshed by handshake and chain size packets
    head_num: AtomicU32,
    head_id: Mutex<Hash>,
    lib_num: AtomicU32,
    lib_id: Mutex<Hash>,
    // time exchange results
    clock_offset_ns: AtomicI64,
    rtt_ns: AtomicI64,
    // org of the outstanding probe, 0 when none
    pending_probe: AtomicI64,
    // last time any frame arrived, drives the inactivity timeout
    last_activity: AtomicU64,
    // ids this peer is known to have or to have been told about
    known_txs: Mutex<LruCache<Hash, Direction>>,
    known_blocks: Mutex<LruCache<Hash, Direction>>,
    // whether the peer has our current chain size info
    needs_chain_size: AtomicBool,
    // set while the sync controller has a range assigned to this peer
    syncing: AtomicBool,
    // fail count with time-based reset, feeds the sync-unfit decision
    fail_count: AtomicU8,
    last_fail: AtomicU64,
    // outbound mailbox; depth tracked separately since mpsc hides it
    tx: Tx,
    queued: AtomicUsize,
    // notifies both tasks to exit
    exit_channel: broadcast::Sender<()>,
}

impl Peer {
    pub fn new(connection: Connection, id: u64, handshake: Handshake) -> (Self, Rx) {
        let (tx, rx) = mpsc::channel(PEER_PACKET_CHANNEL_SIZE);
        let (exit_channel, _) = broadcast::channel(1);

        let peer = Self {
            connection,
            id,
            node_id: handshake.node_id.clone(),
            network_version: handshake.network_version,
            p2p_address: handshake.p2p_address.clone(),
            head_num: AtomicU32::new(handshake.head_num),
            head_id: Mutex::new(handshake.head_id.clone()),
            lib_num: AtomicU32::new(handshake.last_irreversible_block_num),
            lib_id: Mutex::new(handshake.last_irreversible_block_id.clone()),
            last_handshake: Mutex::new(handshake),
            clock_offset_ns: AtomicI64::new(0),
            rtt_ns: AtomicI64::new(i64::MAX),
            pending_probe: AtomicI64::new(0),
            last_activity: AtomicU64::new(get_current_time_in_seconds()),
            known_txs: Mutex::new(LruCache::new(
                NonZeroUsize::new(PEER_TX_CACHE_SIZE).expect("checked non-zero"),
            )),
            known_blocks: Mutex::new(LruCache::new(
                NonZeroUsize::new(PEER_BLOCK_CACHE_SIZE).expect("checked non-zero"),
            )),
            needs_chain_size: AtomicBool::new(true),
            syncing: AtomicBool::new(false),
            fail_count: AtomicU8::new(0),
            last_fail: AtomicU64::new(0),
            tx,
            queued: AtomicUsize::new(0),
            exit_channel,
        };
        (peer, rx)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.connection
    }

    pub fn get_id(&self) -> u64 {
        self.id
    }

    pub fn get_node_id(&self) -> &Hash {
        &self.node_id
    }

    pub fn get_network_version(&self) -> u16 {
        self.network_version
    }

    pub fn get_p2p_address(&self) -> &str {
        &self.p2p_address
    }

    pub fn get_last_handshake(&self) -> &Mutex<Handshake> {
        &self.last_handshake
    }

    // Record a re-handshake on an established connection
    pub async fn update_handshake(&self, handshake: Handshake) {
        self.set_head(handshake.head_num, handshake.head_id.clone()).await;
        self.set_lib(
            handshake.last_irreversible_block_num,
            handshake.last_irreversible_block_id.clone(),
        )
        .await;
        *self.last_handshake.lock().await = handshake;
    }

    pub fn get_head_num(&self) -> BlockNum {
        self.head_num.load(Ordering::SeqCst)
    }

    pub async fn get_head_id(&self) -> Hash {
        self.head_id.lock().await.clone()
    }

    pub async fn set_head(&self, num: BlockNum, id: Hash) {
        self.head_num.store(num, Ordering::SeqCst);
        *self.head_id.lock().await = id;
    }

    pub fn get_lib_num(&self) -> BlockNum {
        self.lib_num.load(Ordering::SeqCst)
    }

    pub async fn set_lib(&self, num: BlockNum, id: Hash) {
        self.lib_num.store(num, Ordering::SeqCst);
        *self.lib_id.lock().await = id;
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub fn set_syncing(&self, value: bool) {
        self.syncing.store(value, Ordering::SeqCst);
        self.connection.set_state(if value { State::Syncing } else { State::Up });
    }

    pub fn needs_chain_size(&self) -> bool {
        self.needs_chain_size.load(Ordering::SeqCst)
    }

    pub fn set_needs_chain_size(&self, value: bool) {
        self.needs_chain_size.store(value, Ordering::SeqCst);
    }

    // ----- time exchange -----

    // Remember the org of a probe we just sent
    pub fn set_pending_probe(&self, org: TimestampNanos) {
        self.pending_probe.store(org, Ordering::SeqCst);
    }

    // Apply a time reply: only a reply matching the outstanding probe
    // updates the offset and RTT
    pub fn handle_time_reply(&self, message: &TimeMessage) -> bool {
        let pending = self.pending_probe.swap(0, Ordering::SeqCst);
        if pending == 0 || pending != message.org {
            if log::log_enabled!(log::Level::Trace) {
                trace!("{} sent a time reply for an unknown probe", self);
            }
            return false;
        }
        self.clock_offset_ns
            .store(message.clock_offset(), Ordering::SeqCst);
        self.rtt_ns.store(message.round_trip(), Ordering::SeqCst);
        true
    }

    pub fn get_clock_offset_ns(&self) -> TimestampNanos {
        self.clock_offset_ns.load(Ordering::SeqCst)
    }

    // i64::MAX until the first completed exchange
    pub fn get_rtt_ns(&self) -> i64 {
        self.rtt_ns.load(Ordering::SeqCst)
    }

    // ----- activity / failure accounting -----

    pub fn touch_activity(&self) {
        self.last_activity
            .store(get_current_time_in_seconds(), Ordering::SeqCst);
    }

    pub fn seconds_since_activity(&self) -> TimestampSeconds {
        get_current_time_in_seconds().saturating_sub(self.last_activity.load(Ordering::SeqCst))
    }

    pub fn get_fail_count(&self) -> u8 {
        self.fail_count.load(Ordering::SeqCst)
    }

    // Track a communication failure. The counter resets after a quiet
    // period so an old incident does not condemn a recovered peer.
    pub fn increment_fail_count(&self) {
        let now = get_current_time_in_seconds();
        let last = self.last_fail.swap(now, Ordering::SeqCst);
        if last + PEER_FAIL_TIME_RESET_SECS < now {
            self.fail_count.store(1, Ordering::SeqCst);
        } else {
            self.fail_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    // ----- knowledge sets -----

    pub async fn knows_tx(&self, id: &Hash) -> bool {
        self.known_txs.lock().await.contains(id)
    }

    pub async fn knows_block(&self, id: &Hash) -> bool {
        self.known_blocks.lock().await.contains(id)
    }

    // Record that the peer learned a transaction id; merges directions on
    // repeat observations
    pub async fn track_tx(&self, id: Hash, direction: Direction) {
        let mut cache = self.known_txs.lock().await;
        match cache.get_mut(&id) {
            Some(existing) => {
                existing.update(direction);
            }
            None => {
                cache.put(id, direction);
            }
        }
    }

    pub async fn track_block(&self, id: Hash, direction: Direction) {
        let mut cache = self.known_blocks.lock().await;
        match cache.get_mut(&id) {
            Some(existing) => {
                existing.update(direction);
            }
            None => {
                cache.put(id, direction);
            }
        }
    }

    #[cfg(test)]
    pub async fn tx_direction(&self, id: &Hash) -> Option<Direction> {
        self.known_txs.lock().await.peek(id).copied()
    }

    // ----- outbound mailbox -----

    pub fn queue_len(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn is_saturated(&self) -> bool {
        self.queue_len() >= PEER_QUEUE_HIGH_WATERMARK
    }

    // Called by the write task after draining one frame
    pub(in crate::p2p) fn mark_dequeued(&self) {
        self.queued.fetch_sub(1, Ordering::SeqCst);
    }

    // Queue a frame without waiting. A full mailbox is the hard cap:
    // the caller disconnects the peer.
    pub fn try_enqueue(&self, bytes: Bytes) -> Result<EnqueueStatus, P2pError> {
        match self.tx.try_send(bytes) {
            Ok(()) => {
                let depth = self.queued.fetch_add(1, Ordering::SeqCst) + 1;
                if depth >= PEER_QUEUE_HIGH_WATERMARK {
                    Ok(EnqueueStatus::Saturated)
                } else {
                    Ok(EnqueueStatus::Sent)
                }
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(P2pError::Busy),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(P2pError::Disconnected),
        }
    }

    pub fn try_enqueue_packet(&self, packet: Packet<'_>) -> Result<EnqueueStatus, P2pError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("queueing {:?} for {}", packet.id(), self);
        }
        self.try_enqueue(Bytes::from(packet.to_bytes()))
    }

    // Await mailbox room; used on request/response paths where waiting is
    // acceptable
    pub async fn send_packet(&self, packet: Packet<'_>) -> Result<(), P2pError> {
        self.tx
            .send(Bytes::from(packet.to_bytes()))
            .await
            .map_err(|e| P2pError::SendError(e.to_string()))?;
        self.queued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    // ----- lifecycle -----

    pub fn get_exit_receiver(&self) -> broadcast::Receiver<()> {
        self.exit_channel.subscribe()
    }

    // Wake the tasks so they observe the closing state
    pub fn signal_exit(&self) {
        // an error only means nobody is listening anymore
        let _ = self.exit_channel.send(());
    }

    pub async fn close(&self) -> Result<(), P2pError> {
        self.signal_exit();
        self.connection.close().await
    }
}

impl Display for Peer {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "Peer[id: {}, node: {}, addr: {}, head: {}, lib: {}, state: {:?}, queue: {}, fails: {}]",
            self.id,
            self.node_id,
            self.connection.get_address(),
            self.get_head_num(),
            self.get_lib_num(),
            self.connection.get_state(),
            self.queue_len(),
            self.get_fail_count(),
        )
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        // This shouldn't happen, but in case we have a lurking bug somewhere
        if !self.connection.is_closed() {
            if log::log_enabled!(log::Level::Warn) {
                warn!("{} was not closed correctly /!\\", self);
            }
        }
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Peer {}

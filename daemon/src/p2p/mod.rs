pub mod chain_sync;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod gossip;
pub mod packet;
pub mod peer_list;


pub use connection::{Connection, State};
pub use dispatcher::Dispatcher;
pub use error::P2pError;
pub use peer_list::{Peer, PeerList, SharedPeerList};

use crate::{
    config::{
        NETWORK_VERSION, NETWORK_VERSION_RANGE, PEER_ENDPOINT_CACHE_SIZE,
        PEER_INACTIVITY_TIMEOUT_SECS, TIME_PROBE_INTERVAL_SECS,
    },
    core::{BlockError, ChainController},
    p2p::{
        chain_sync::SyncController,
        packet::{
            ChainSize, GoAway, GoAwayReason, Handshake, Packet, SyncRequest, TimeMessage,
            MAX_PACKET_ID,
        },
        peer_list::Rx,
    },
};
use arcadia_common::{
    api::daemon::{ConnectionStatus, Direction, HandshakeInfo},
    block::{BlockNum, SignedBlock},
    crypto::{Hash, KeyPair},
    serializer::Serializer,
    time::get_current_time_in_nanos,
};
use log::{debug, error, info, trace, warn};
use lru::LruCache;
use std::{
    borrow::Cow,
    collections::BTreeMap,
    net::SocketAddr,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, AtomicI16, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::{broadcast, Mutex},
    time::{interval, timeout},
};

// How long the initial handshake exchange may take before the socket is
// dropped
const HANDSHAKE_TIMEOUT_SECS: u64 = 5;

#[derive(Clone, Debug)]
pub struct P2pConfig {
    pub bind_address: String,
    // endpoints dialed at startup
    pub seed_peers: Vec<String>,
    pub chain_id: Hash,
    pub node_id: Hash,
    // address advertised to peers in the handshake
    pub p2p_address: String,
    pub agent: String,
}

// The p2p subsystem: owns the listener, the peer registry, the global
// dispatcher and the sync controller. The chain controller is the only
// external dependency.
pub struct P2pServer<C: ChainController> {
    config: P2pConfig,
    keypair: KeyPair,
    chain: Arc<C>,
    peer_list: SharedPeerList,
    dispatcher: Dispatcher,
    sync: Mutex<SyncController>,
    // blocks from parallel sync chunks waiting for their predecessor
    pub(in crate::p2p) sync_buffer: Mutex<BTreeMap<BlockNum, SignedBlock>>,
    // handshake generation counter, bumped on every re-handshake we send
    generation: AtomicI16,
    // verified endpoints learned from peer handshakes, pending relay
    endpoints: Mutex<LruCache<String, bool>>,
    exit_channel: broadcast::Sender<()>,
    running: AtomicBool,
}

impl<C: ChainController> P2pServer<C> {
    pub fn new(config: P2pConfig, keypair: KeyPair, chain: Arc<C>) -> Arc<Self> {
        let (exit_channel, _) = broadcast::channel(1);
        Arc::new(Self {
            config,
            keypair,
            chain,
            peer_list: PeerList::new(),
            dispatcher: Dispatcher::new(),
            sync: Mutex::new(SyncController::new()),
            sync_buffer: Mutex::new(BTreeMap::new()),
            generation: AtomicI16::new(0),
            endpoints: Mutex::new(LruCache::new(
                NonZeroUsize::new(PEER_ENDPOINT_CACHE_SIZE).expect("checked non-zero"),
            )),
            exit_channel,
            running: AtomicBool::new(false),
        })
    }

    pub fn get_peer_list(&self) -> &SharedPeerList {
        &self.peer_list
    }

    pub fn get_dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn get_chain(&self) -> &Arc<C> {
        &self.chain
    }

    pub fn node_id(&self) -> &Hash {
        &self.config.node_id
    }

    pub async fn is_sync_active(&self) -> bool {
        self.sync.lock().await.is_active()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // Bind the listener, dial the seed peers and spawn the maintenance
    // task. Returns once the listener is ready.
    pub async fn start(self: &Arc<Self>) -> Result<SocketAddr, P2pError> {
        let listener = TcpListener::bind(&self.config.bind_address)
            .await
            .map_err(P2pError::Io)?;
        let local_addr = listener.local_addr()?;
        info!("p2p server listening on {}", local_addr);
        self.running.store(true, Ordering::SeqCst);

        // accept loop
        {
            let server = Arc::clone(self);
            let mut exit = server.exit_channel.subscribe();
            tokio::spawn(async move {
                loop {
                    select! {
                        _ = exit.recv() => break,
                        res = listener.accept() => match res {
                            Ok((stream, addr)) => {
                                if server.peer_list.is_full().await {
                                    debug!("peer limit reached, refusing {}", addr);
                                    continue;
                                }
                                let server = Arc::clone(&server);
                                tokio::spawn(async move {
                                    if let Err(e) = server.handle_new_connection(stream, addr, false).await {
                                        debug!("inbound connection {} failed: {}", addr, e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("error while accepting connection: {}", e);
                                break;
                            }
                        }
                    }
                }
                debug!("accept loop exited");
            });
        }

        // maintenance: keepalive probes, inactivity checks, sync ticks
        {
            let server = Arc::clone(self);
            let mut exit = server.exit_channel.subscribe();
            tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(1));
                let mut tick: u64 = 0;
                loop {
                    select! {
                        _ = exit.recv() => break,
                        _ = ticker.tick() => {
                            tick += 1;
                            server.maintenance_tick(tick).await;
                        }
                    }
                }
                debug!("maintenance loop exited");
            });
        }

        // dial configured seeds
        for seed in self.config.seed_peers.clone() {
            let server = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = server.connect_to(&seed).await {
                    warn!("failed to connect to seed {}: {}", seed, e);
                }
            });
        }

        Ok(local_addr)
    }

    // Shut down: cancel the loops and close every connection
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("stopping p2p server");
        let _ = self.exit_channel.send(());
        self.peer_list.close_all().await;
    }

    // Dial a remote endpoint and run the handshake exchange
    pub async fn connect_to(self: &Arc<Self>, endpoint: &str) -> Result<Arc<Peer>, P2pError> {
        if self.peer_list.find_by_endpoint(endpoint).await.is_some() {
            return Err(P2pError::AlreadyConnected(endpoint.to_string()));
        }
        let addr: SocketAddr = endpoint
            .parse()
            .map_err(|_| P2pError::InvalidEndpoint(endpoint.to_string()))?;

        debug!("connecting to {}", addr);
        let stream = timeout(
            Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
            TcpStream::connect(addr),
        )
        .await??;
        self.handle_new_connection(stream, addr, true).await
    }

    // Both sides send their handshake immediately after the socket opens,
    // then validate what the other sent
    async fn handle_new_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        addr: SocketAddr,
        out: bool,
    ) -> Result<Arc<Peer>, P2pError> {
        stream.set_nodelay(true)?;
        let connection = Connection::new(stream, addr, out);
        connection.set_state(State::Handshaking);

        let handshake = self.build_handshake();
        connection
            .send_bytes(&Packet::Handshake(Cow::Borrowed(&handshake)).to_bytes().into())
            .await?;

        let their_handshake = timeout(
            Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
            self.read_handshake(&connection),
        )
        .await??;

        match self.verify_handshake(&their_handshake).await {
            Ok(()) => {}
            Err(reason) => {
                // exactly one GoAway frame, then close
                let go_away = GoAway::new(reason, self.config.node_id.clone());
                let bytes = Packet::GoAway(Cow::Borrowed(&go_away)).to_bytes();
                if let Err(e) = connection.send_bytes(&bytes.into()).await {
                    debug!("failed to send go away to {}: {}", addr, e);
                }
                connection.close().await?;
                return Err(P2pError::HandshakeRejected(reason));
            }
        }

        connection.set_state(State::Up);
        let (peer, rx) = Peer::new(connection, self.peer_list.next_peer_id(), their_handshake);
        let peer = Arc::new(peer);
        self.peer_list.add_peer(peer.clone()).await?;

        // learn the peer's verified endpoint for later relay
        if !peer.get_p2p_address().is_empty() {
            let mut endpoints = self.endpoints.lock().await;
            endpoints.put(peer.get_p2p_address().to_string(), false);
        }

        self.spawn_peer_tasks(&peer, rx);
        self.send_time_probe(&peer);
        self.maybe_enter_sync(&peer).await;
        Ok(peer)
    }

    async fn read_handshake(&self, connection: &Connection) -> Result<Handshake, P2pError> {
        let bytes = connection.read_packet_bytes().await?;
        match Packet::from_bytes(&bytes)? {
            Packet::Handshake(handshake) => Ok(handshake.into_owned()),
            packet => {
                debug!(
                    "expected a handshake from {}, got tag {}",
                    connection.get_address(),
                    packet.id()
                );
                Err(P2pError::HandshakeRejected(GoAwayReason::FatalOther))
            }
        }
    }

    fn build_handshake(&self) -> Handshake {
        let mut handshake = Handshake {
            network_version: NETWORK_VERSION,
            chain_id: self.chain.chain_id(),
            node_id: self.config.node_id.clone(),
            key: self.keypair.public_key(),
            time: get_current_time_in_nanos(),
            token: Hash::zero(),
            sig: arcadia_common::crypto::Signature::zero(),
            p2p_address: self.config.p2p_address.clone(),
            last_irreversible_block_num: self.chain.lib_num(),
            last_irreversible_block_id: self.chain.lib_id(),
            head_num: self.chain.head_num(),
            head_id: self.chain.head_id(),
            os: std::env::consts::OS.to_string(),
            agent: self.config.agent.clone(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst),
        };
        handshake.sign(&self.keypair);
        handshake
    }

    // Validation order is part of the protocol: chain, version, self,
    // authentication, duplicate
    async fn verify_handshake(&self, handshake: &Handshake) -> Result<(), GoAwayReason> {
        if handshake.chain_id != self.chain.chain_id() {
            return Err(GoAwayReason::WrongChain);
        }
        let version_distance = handshake.network_version.abs_diff(NETWORK_VERSION);
        if version_distance > NETWORK_VERSION_RANGE {
            return Err(GoAwayReason::WrongVersion);
        }
        if handshake.node_id == self.config.node_id {
            return Err(GoAwayReason::SelfConnect);
        }

        // signature checks are CPU bound, keep them off the reactor
        let check = handshake.clone();
        let valid = tokio::task::spawn_blocking(move || check.verify_signature())
            .await
            .unwrap_or(false);
        if !valid {
            return Err(GoAwayReason::Authentication);
        }

        if self.peer_list.has_node_id(&handshake.node_id).await {
            return Err(GoAwayReason::Duplicate);
        }
        Ok(())
    }

    fn spawn_peer_tasks(self: &Arc<Self>, peer: &Arc<Peer>, rx: Rx) {
        // read task: decode frames and dispatch until error or exit
        {
            let server = Arc::clone(self);
            let peer = Arc::clone(peer);
            tokio::spawn(async move {
                let mut exit = peer.get_exit_receiver();
                loop {
                    select! {
                        biased;
                        _ = exit.recv() => break,
                        res = peer.get_connection().read_packet_bytes() => {
                            let bytes = match res {
                                Ok(bytes) => bytes,
                                Err(e) => {
                                    debug!("read error from {}: {}", peer, e);
                                    break;
                                }
                            };
                            peer.touch_activity();
                            if let Err(e) = server.handle_packet_bytes(&peer, &bytes).await {
                                server.handle_peer_error(&peer, e).await;
                                break;
                            }
                        }
                    }
                }
                server.unregister_peer(&peer).await;
            });
        }

        // write task: drain the mailbox into the socket, flush at most one
        // pending frame on exit
        {
            let peer = Arc::clone(peer);
            let mut rx = rx;
            tokio::spawn(async move {
                let mut exit = peer.get_exit_receiver();
                loop {
                    select! {
                        biased;
                        _ = exit.recv() => {
                            if let Ok(bytes) = rx.try_recv() {
                                peer.mark_dequeued();
                                if let Err(e) = peer.get_connection().send_bytes(&bytes).await {
                                    debug!("flush error for {}: {}", peer, e);
                                }
                            }
                            break;
                        }
                        bytes = rx.recv() => match bytes {
                            Some(bytes) => {
                                peer.mark_dequeued();
                                if let Err(e) = peer.get_connection().send_bytes(&bytes).await {
                                    debug!("write error for {}: {}", peer, e);
                                    peer.signal_exit();
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
                if let Err(e) = peer.get_connection().close().await {
                    debug!("error while closing connection of {}: {}", peer, e);
                }
            });
        }
    }

    // Map a handling failure to the go-away taxonomy, send the frame and
    // drop the peer
    async fn handle_peer_error(&self, peer: &Arc<Peer>, error: P2pError) {
        let reason = match &error {
            P2pError::Protocol(_) | P2pError::UnknownPacketTag(_) | P2pError::FrameTooLarge(_, _) => {
                Some(GoAwayReason::FatalOther)
            }
            P2pError::BlockRejected(BlockError::Unlinkable) => Some(GoAwayReason::Unlinkable),
            P2pError::BlockRejected(BlockError::Validation(_)) => Some(GoAwayReason::Validation),
            P2pError::TransactionRejected(_) => Some(GoAwayReason::BadTransaction),
            P2pError::Busy => Some(GoAwayReason::BenignOther),
            P2pError::BlockNotAvailable(_) => Some(GoAwayReason::BenignOther),
            // the peer already said goodbye or the socket died
            P2pError::GoAwayReceived(_) | P2pError::Io(_) | P2pError::Disconnected => None,
            _ => Some(GoAwayReason::BenignOther),
        };
        peer.increment_fail_count();
        warn!("dropping {}: {}", peer, error);
        if let Some(reason) = reason {
            self.send_go_away(peer, reason).await;
        }
    }

    async fn send_go_away(&self, peer: &Arc<Peer>, reason: GoAwayReason) {
        let go_away = GoAway::new(reason, self.config.node_id.clone());
        // direct write: the mailbox may already be saturated or closed
        let bytes = Packet::GoAway(Cow::Borrowed(&go_away)).to_bytes();
        if let Err(e) = peer.get_connection().send_bytes(&bytes.into()).await {
            debug!("failed to send go away to {}: {}", peer, e);
        }
    }

    async fn unregister_peer(self: &Arc<Self>, peer: &Arc<Peer>) {
        self.peer_list.remove_peer(peer.get_id()).await;
        if let Err(e) = peer.close().await {
            debug!("error while closing {}: {}", peer, e);
        }
        // chunks assigned to this peer go back into the queue
        let mut sync = self.sync.lock().await;
        if sync.is_active() && sync.on_peer_failed(peer.get_id(), Instant::now()) > 0 {
            drop(sync);
            self.drive_sync().await;
        }
    }

    // Decode and handle one inbound frame
    async fn handle_packet_bytes(
        self: &Arc<Self>,
        peer: &Arc<Peer>,
        bytes: &[u8],
    ) -> Result<(), P2pError> {
        // classify unknown tags before the decoder turns them into a
        // generic protocol error
        match bytes.first() {
            Some(tag) if *tag > MAX_PACKET_ID => {
                return Err(P2pError::UnknownPacketTag(*tag));
            }
            None => return Err(P2pError::Protocol(
                arcadia_common::serializer::ReaderError::InvalidValue,
            )),
            _ => {}
        }
        let packet = Packet::from_bytes(bytes)?;
        self.handle_packet(peer, packet).await
    }

    async fn handle_packet(
        self: &Arc<Self>,
        peer: &Arc<Peer>,
        packet: Packet<'_>,
    ) -> Result<(), P2pError> {
        match packet {
            Packet::Handshake(handshake) => {
                let handshake = handshake.into_owned();
                if log::log_enabled!(log::Level::Debug) {
                    debug!("re-handshake from {}: {}", peer, handshake);
                }
                // a re-handshake must still pass every check except
                // duplicate (this node is the live connection)
                if handshake.chain_id != self.chain.chain_id() {
                    return Err(P2pError::HandshakeRejected(GoAwayReason::WrongChain));
                }
                if !handshake.verify_signature() {
                    return Err(P2pError::HandshakeRejected(GoAwayReason::Authentication));
                }
                peer.update_handshake(handshake).await;
                self.maybe_enter_sync(peer).await;
            }
            Packet::ChainSize(chain_size) => {
                let chain_size = chain_size.into_owned();
                if log::log_enabled!(log::Level::Trace) {
                    trace!("chain size from {}: head {}", peer, chain_size.head_num);
                }
                peer.set_head(chain_size.head_num, chain_size.head_id).await;
                peer.set_lib(
                    chain_size.last_irreversible_block_num,
                    chain_size.last_irreversible_block_id,
                )
                .await;
                self.maybe_enter_sync(peer).await;
            }
            Packet::GoAway(go_away) => {
                let reason = go_away.reason;
                info!("{} sent go away: {}", peer, reason.as_str());
                return Err(P2pError::GoAwayReceived(reason));
            }
            Packet::Time(message) => {
                self.handle_time(peer, *message.as_ref()).await?;
            }
            Packet::Notice(notice) => {
                self.handle_notice(peer, notice.into_owned()).await?;
            }
            Packet::Request(request) => {
                self.handle_request(peer, request.into_owned()).await?;
            }
            Packet::SyncRequest(request) => {
                self.handle_sync_request(peer, *request.as_ref()).await?;
            }
            Packet::Block(block) => {
                self.handle_block(peer, block.into_owned()).await?;
            }
            Packet::Transaction(tx) => {
                self.handle_transaction(peer, tx.into_owned()).await?;
            }
        }
        Ok(())
    }

    async fn handle_time(&self, peer: &Arc<Peer>, message: TimeMessage) -> Result<(), P2pError> {
        let now = get_current_time_in_nanos();
        if message.rec == 0 && message.xmt == 0 {
            // a fresh probe: echo it back with our receive/transmit stamps
            let reply = TimeMessage::reply_to(&message, now, get_current_time_in_nanos());
            peer.send_packet(Packet::Time(Cow::Owned(reply))).await?;
        } else {
            // a reply to our probe: dst is filled locally
            let mut reply = message;
            reply.dst = now;
            if peer.handle_time_reply(&reply) && log::log_enabled!(log::Level::Trace) {
                trace!(
                    "clock offset for {}: {} ns, rtt {} ns",
                    peer,
                    peer.get_clock_offset_ns(),
                    peer.get_rtt_ns()
                );
            }
        }
        Ok(())
    }

    fn send_time_probe(&self, peer: &Arc<Peer>) {
        let probe = TimeMessage::probe(get_current_time_in_nanos());
        peer.set_pending_probe(probe.org);
        if let Err(e) = peer.try_enqueue_packet(Packet::Time(Cow::Owned(probe))) {
            debug!("failed to queue time probe for {}: {}", peer, e);
        }
    }

    // Stream the requested range in order. A hole in our chain aborts the
    // stream and the connection.
    async fn handle_sync_request(
        &self,
        peer: &Arc<Peer>,
        request: SyncRequest,
    ) -> Result<(), P2pError> {
        debug!("{} requested {}", peer, request);
        for num in request.start_block..=request.end_block {
            let Some(block) = self.chain.block_by_num(num).await else {
                warn!("gap at block {} while serving {}", num, request);
                return Err(P2pError::BlockNotAvailable(num));
            };
            peer.track_block(block.id(), Direction::Out).await;
            peer.send_packet(Packet::Block(Cow::Owned(block))).await?;
        }
        Ok(())
    }

    // Periodic housekeeping across all peers
    async fn maintenance_tick(self: &Arc<Self>, tick: u64) {
        for peer in self.peer_list.get_cloned_peers().await {
            if peer.seconds_since_activity() > PEER_INACTIVITY_TIMEOUT_SECS {
                warn!("{} inactive for too long", peer);
                self.send_go_away(&peer, GoAwayReason::BenignOther).await;
                peer.signal_exit();
                continue;
            }
            if tick % TIME_PROBE_INTERVAL_SECS == 0 {
                self.send_time_probe(&peer);
            }
        }

        // endpoints learned from handshakes back-fill the peer set; the
        // wire has no dedicated message for them
        if tick % 16 == 0 && !self.peer_list.is_full().await {
            for endpoint in self.take_unrelayed_endpoints().await {
                if self.peer_list.find_by_endpoint(&endpoint).await.is_some() {
                    continue;
                }
                let server = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = server.connect_to(&endpoint).await {
                        debug!("failed to dial learned endpoint {}: {}", endpoint, e);
                    }
                });
            }
        }

        self.sync_tick().await;
    }

    // ----- admin API, exposed through the rpc module -----

    pub async fn connect(self: &Arc<Self>, endpoint: &str) -> String {
        match self.connect_to(endpoint).await {
            Ok(peer) => format!("connected to {}", peer.get_connection().get_address()),
            Err(P2pError::AlreadyConnected(_)) => "already connected".to_string(),
            Err(e) => format!("unable to connect: {}", e),
        }
    }

    pub async fn disconnect(&self, endpoint: &str) -> String {
        match self.peer_list.find_by_endpoint(endpoint).await {
            Some(peer) => {
                self.send_go_away(&peer, GoAwayReason::NoReason).await;
                peer.signal_exit();
                "connection removed".to_string()
            }
            None => "no known connection for this endpoint".to_string(),
        }
    }

    pub async fn status(&self, endpoint: &str) -> Option<ConnectionStatus> {
        let peer = self.peer_list.find_by_endpoint(endpoint).await?;
        Some(self.connection_status(&peer).await)
    }

    pub async fn connections(&self) -> Vec<ConnectionStatus> {
        let peers = self.peer_list.get_cloned_peers().await;
        futures::future::join_all(peers.iter().map(|peer| self.connection_status(peer))).await
    }

    async fn connection_status(&self, peer: &Arc<Peer>) -> ConnectionStatus {
        let state = peer.get_connection().get_state();
        let handshake = peer.get_last_handshake().lock().await;
        ConnectionStatus {
            peer: peer.get_connection().get_address().to_string(),
            connecting: matches!(state, State::Connecting | State::Handshaking),
            syncing: peer.is_syncing(),
            last_handshake: Some(HandshakeInfo {
                network_version: handshake.network_version,
                node_id: handshake.node_id.clone(),
                p2p_address: handshake.p2p_address.clone(),
                last_irreversible_block_num: handshake.last_irreversible_block_num,
                last_irreversible_block_id: handshake.last_irreversible_block_id.clone(),
                head_num: handshake.head_num,
                head_id: handshake.head_id.clone(),
                os: handshake.os.clone(),
                agent: handshake.agent.clone(),
                generation: handshake.generation,
                time: handshake.time,
            }),
        }
    }

    // ----- chain events, called by the host application -----

    // A transaction entered our mempool locally (RPC submission)
    pub async fn on_new_transaction(
        self: &Arc<Self>,
        tx: arcadia_common::transaction::PackedTransaction,
    ) -> Result<(), P2pError> {
        let Some(tx) = self.dispatcher.on_accepted_transaction(tx).await else {
            return Ok(());
        };
        self.broadcast_transaction(&tx, None).await;
        Ok(())
    }

    // A block was produced or accepted locally. Every peer now lacks our
    // new chain position until told otherwise.
    pub async fn on_new_block(self: &Arc<Self>, block: SignedBlock) -> Result<(), P2pError> {
        let Some(block) = self.dispatcher.on_accepted_block(block).await else {
            return Ok(());
        };
        for peer in self.peer_list.get_cloned_peers().await {
            peer.set_needs_chain_size(true);
        }
        self.broadcast_block(&block, None).await;
        Ok(())
    }

    // The chain controller advanced its irreversible mark
    pub async fn on_irreversible_block(&self, num: BlockNum) {
        self.dispatcher.on_irreversible_block(num).await;
    }

    pub(in crate::p2p) fn build_chain_size(&self) -> ChainSize {
        ChainSize {
            last_irreversible_block_num: self.chain.lib_num(),
            last_irreversible_block_id: self.chain.lib_id(),
            head_num: self.chain.head_num(),
            head_id: self.chain.head_id(),
        }
    }

    // Pop endpoints that still need a relay round
    pub(in crate::p2p) async fn take_unrelayed_endpoints(&self) -> Vec<String> {
        let mut endpoints = self.endpoints.lock().await;
        let pending: Vec<String> = endpoints
            .iter()
            .filter(|(_, relayed)| !**relayed)
            .map(|(endpoint, _)| endpoint.clone())
            .collect();
        for endpoint in &pending {
            endpoints.put(endpoint.clone(), true);
        }
        pending
    }
}

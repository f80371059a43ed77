use crate::{config::PEER_MAX_PACKET_SIZE, p2p::error::P2pError};
use arcadia_common::time::{get_current_time_in_seconds, TimestampSeconds};
use bytes::Bytes;
use log::trace;
use std::{
    fmt::{Display, Error, Formatter},
    net::SocketAddr,
    sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::Mutex,
};

// Lifecycle of one connection. `Up` requires a validated handshake.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum State {
    Connecting = 0,
    Handshaking = 1,
    Up = 2,
    Syncing = 3,
    Closing = 4,
}

impl State {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Handshaking,
            2 => Self::Up,
            3 => Self::Syncing,
            _ => Self::Closing,
        }
    }
}

// Manages read/write on one TCP stream with length-prefixed frames:
// [u32 LE length][tag + payload], length covering tag + payload.
// The halves are split so the read task and write task never contend.
pub struct Connection {
    read: Mutex<OwnedReadHalf>,
    write: Mutex<OwnedWriteHalf>,
    addr: SocketAddr,
    // true when we dialed the peer
    out: bool,
    state: AtomicU8,
    closed: AtomicBool,
    bytes_in: AtomicUsize,
    bytes_out: AtomicUsize,
    connected_on: TimestampSeconds,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr, out: bool) -> Self {
        let (read, write) = stream.into_split();
        Self {
            read: Mutex::new(read),
            write: Mutex::new(write),
            addr,
            out,
            state: AtomicU8::new(State::Connecting as u8),
            closed: AtomicBool::new(false),
            bytes_in: AtomicUsize::new(0),
            bytes_out: AtomicUsize::new(0),
            connected_on: get_current_time_in_seconds(),
        }
    }

    pub fn get_address(&self) -> &SocketAddr {
        &self.addr
    }

    pub fn is_out(&self) -> bool {
        self.out
    }

    pub fn get_state(&self) -> State {
        State::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: State) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn bytes_in(&self) -> usize {
        self.bytes_in.load(Ordering::SeqCst)
    }

    pub fn bytes_out(&self) -> usize {
        self.bytes_out.load(Ordering::SeqCst)
    }

    pub fn connected_on(&self) -> TimestampSeconds {
        self.connected_on
    }

    // Write one frame and flush it
    pub async fn send_bytes(&self, bytes: &Bytes) -> Result<(), P2pError> {
        let len = bytes.len() as u32;
        if len > PEER_MAX_PACKET_SIZE {
            return Err(P2pError::FrameTooLarge(len, PEER_MAX_PACKET_SIZE));
        }

        if log::log_enabled!(log::Level::Trace) {
            trace!("sending frame of {} bytes to {}", len, self.addr);
        }

        let mut stream = self.write.lock().await;
        stream.write_all(&len.to_le_bytes()).await?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        self.bytes_out
            .fetch_add(4 + bytes.len(), Ordering::SeqCst);
        Ok(())
    }

    // Read one frame, rejecting any length above the configured cap
    // before allocating
    pub async fn read_packet_bytes(&self) -> Result<Vec<u8>, P2pError> {
        let mut stream = self.read.lock().await;

        let mut length_buffer = [0u8; 4];
        stream.read_exact(&mut length_buffer).await?;
        let len = u32::from_le_bytes(length_buffer);
        if len == 0 || len > PEER_MAX_PACKET_SIZE {
            return Err(P2pError::FrameTooLarge(len, PEER_MAX_PACKET_SIZE));
        }

        let mut payload = vec![0u8; len as usize];
        stream.read_exact(&mut payload).await?;
        self.bytes_in
            .fetch_add(4 + payload.len(), Ordering::SeqCst);

        if log::log_enabled!(log::Level::Trace) {
            trace!("read frame of {} bytes from {}", len, self.addr);
        }
        Ok(payload)
    }

    // Idempotent: the first caller shuts the socket down, later calls are
    // no-ops
    pub async fn close(&self) -> Result<(), P2pError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.set_state(State::Closing);
        let mut stream = self.write.lock().await;
        stream.shutdown().await?;
        Ok(())
    }
}

impl Display for Connection {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "Connection[peer: {}, state: {:?}, out: {}, read: {} B, sent: {} B, connected since: {}, closed: {}]",
            self.addr,
            self.get_state(),
            self.out,
            self.bytes_in(),
            self.bytes_out(),
            self.connected_on,
            self.is_closed()
        )
    }
}

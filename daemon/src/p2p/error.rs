use crate::{
    core::{BlockError, TransactionError},
    p2p::packet::GoAwayReason,
};
use arcadia_common::serializer::ReaderError;
use std::io::Error as IoError;
use thiserror::Error;
use tokio::time::error::Elapsed;

#[derive(Error, Debug)]
pub enum P2pError {
    // Frame too large, unknown tag, malformed payload, bounded string
    // exceeded. The connection closes with `fatal_other`.
    #[error("protocol error: {0}")]
    Protocol(#[from] ReaderError),

    #[error("frame of {0} bytes exceeds the {1} bytes cap")]
    FrameTooLarge(u32, u32),

    #[error("unknown packet tag {0}")]
    UnknownPacketTag(u8),

    #[error("handshake rejected: {}", .0.as_str())]
    HandshakeRejected(GoAwayReason),

    #[error("block validation failed: {0}")]
    BlockRejected(#[from] BlockError),

    #[error("transaction verification failed: {0}")]
    TransactionRejected(#[from] TransactionError),

    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("timed out: {0}")]
    Timeout(#[from] Elapsed),

    #[error("outbound queue saturated")]
    Busy,

    #[error("peer disconnected")]
    Disconnected,

    #[error("peer sent go away: {}", .0.as_str())]
    GoAwayReceived(GoAwayReason),

    #[error("peer limit reached ({0})")]
    PeerLimitReached(usize),

    #[error("already connected to {0}")]
    AlreadyConnected(String),

    #[error("no connection matches endpoint {0}")]
    UnknownEndpoint(String),

    #[error("invalid endpoint address: {0}")]
    InvalidEndpoint(String),

    #[error("error while sending on channel: {0}")]
    SendError(String),

    #[error("requested block {0} is not available")]
    BlockNotAvailable(u32),
}

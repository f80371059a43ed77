use arcadia_common::time::TimestampMillis;

// Protocol revision spoken by this build. A peer is compatible when its
// version is within NETWORK_VERSION_RANGE of ours.
pub const NETWORK_VERSION: u16 = 1;
pub const NETWORK_VERSION_RANGE: u16 = 0;

// bind addresses
pub const DEFAULT_P2P_BIND_ADDRESS: &str = "0.0.0.0:2125";

// Frame rules
// A frame is [u32 length][u8 tag][payload]; length covers tag + payload
pub const PEER_MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024; // 16 MiB

// Handshake string bounds, observable on the wire
// Longest domain name is 253 characters, ":port" adds 6
pub const MAX_P2P_ADDRESS_LENGTH: usize = 253 + 6;
pub const MAX_HANDSHAKE_STR_LENGTH: usize = 384;

// Gossip rules
// Payloads above 3x MTU travel as a Notice; the peer requests them
pub const NETWORK_MTU: usize = 1500;
pub const PAYLOAD_RELAY_THRESHOLD: usize = 3 * NETWORK_MTU;

// Per-peer knowledge caches (LRU)
pub const PEER_TX_CACHE_SIZE: usize = 20_480;
pub const PEER_BLOCK_CACHE_SIZE: usize = 1_024;

// Endpoints learned from peer handshakes, relayed once verified
pub const PEER_ENDPOINT_CACHE_SIZE: usize = 256;

// Outbound mailbox: channel capacity doubles as the hard cap; the gossip
// engine degrades to notices above the high watermark
pub const PEER_PACKET_CHANNEL_SIZE: usize = 1_024;
pub const PEER_QUEUE_HIGH_WATERMARK: usize = 768;

// Keepalive / time exchange
pub const TIME_PROBE_INTERVAL_SECS: u64 = 4;
pub const PEER_INACTIVITY_TIMEOUT_SECS: u64 = 30;

// Fail accounting: counter resets after this much quiet time
pub const PEER_FAIL_TIME_RESET_SECS: u64 = 60;

// Block production cadence assumed by the sync trigger
pub const BLOCK_INTERVAL_MILLIS: TimestampMillis = 500;
pub const SYNC_ROUND_SIZE: u64 = 21;

// Cluster sync
pub const SYNC_CHUNK_SIZE: u32 = 100;
pub const SYNC_IN_FLIGHT_PER_PEER: usize = 2;
pub const SYNC_CHUNK_TIMEOUT_SECS: u64 = 10;
pub const SYNC_UNFIT_COOLDOWN_SECS: u64 = 60;
// Starting chunk budget granted to every eligible peer; halved on failure
pub const SYNC_PEER_CHUNK_BUDGET: u32 = 8;

// Dispatcher retention: transactions are kept this many blocks past the
// block that made them irreversible; blocks this far below LIB are pruned
pub const DISPATCHER_TX_GRACE_BLOCKS: u32 = 10;
pub const DISPATCHER_BLOCK_WINDOW: u32 = 100;

// Maximum peers accepted before inbound connections are refused
pub const PEER_MAX_COUNT: usize = 32;

// Compile-time validation that cache sizes are non-zero: the LruCache
// constructors rely on it
const _: () = assert!(PEER_TX_CACHE_SIZE > 0, "PEER_TX_CACHE_SIZE must be non-zero");
const _: () = assert!(
    PEER_BLOCK_CACHE_SIZE > 0,
    "PEER_BLOCK_CACHE_SIZE must be non-zero"
);
const _: () = assert!(
    PEER_ENDPOINT_CACHE_SIZE > 0,
    "PEER_ENDPOINT_CACHE_SIZE must be non-zero"
);
const _: () = assert!(
    PEER_QUEUE_HIGH_WATERMARK < PEER_PACKET_CHANNEL_SIZE,
    "high watermark must stay below the channel capacity"
);
const _: () = assert!(SYNC_CHUNK_SIZE > 0, "SYNC_CHUNK_SIZE must be non-zero");

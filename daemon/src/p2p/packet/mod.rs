mod chain_size;
mod go_away;
mod handshake;
mod notice;
mod select_ids;
mod sync_request;
mod time_sync;

pub use chain_size::ChainSize;
pub use go_away::{GoAway, GoAwayReason};
pub use handshake::Handshake;
pub use notice::{Notice, Request};
pub use select_ids::{IdListMode, SelectIds};
pub use sync_request::SyncRequest;
pub use time_sync::TimeMessage;

use arcadia_common::{
    block::SignedBlock,
    serializer::{Reader, ReaderError, Serializer, Writer},
    transaction::PackedTransaction,
};
use std::borrow::Cow;

// Wire tags. Observable by every peer: do not reorder.
const HANDSHAKE_ID: u8 = 0;
const CHAIN_SIZE_ID: u8 = 1;
const GO_AWAY_ID: u8 = 2;
const TIME_ID: u8 = 3;
const NOTICE_ID: u8 = 4;
const REQUEST_ID: u8 = 5;
const SYNC_REQUEST_ID: u8 = 6;
const BLOCK_ID: u8 = 7;
const TRANSACTION_ID: u8 = 8;

// Highest tag currently assigned, used to classify unknown tags early
pub const MAX_PACKET_ID: u8 = TRANSACTION_ID;

// All messages exchanged between peers. Payload variants borrow on the
// send path so broadcasting does not clone the block or transaction.
#[derive(Clone, PartialEq, Debug)]
pub enum Packet<'a> {
    Handshake(Cow<'a, Handshake>),
    ChainSize(Cow<'a, ChainSize>),
    GoAway(Cow<'a, GoAway>),
    Time(Cow<'a, TimeMessage>),
    Notice(Cow<'a, Notice>),
    Request(Cow<'a, Request>),
    SyncRequest(Cow<'a, SyncRequest>),
    Block(Cow<'a, SignedBlock>),
    Transaction(Cow<'a, PackedTransaction>),
}

impl Packet<'_> {
    pub fn id(&self) -> u8 {
        match self {
            Self::Handshake(_) => HANDSHAKE_ID,
            Self::ChainSize(_) => CHAIN_SIZE_ID,
            Self::GoAway(_) => GO_AWAY_ID,
            Self::Time(_) => TIME_ID,
            Self::Notice(_) => NOTICE_ID,
            Self::Request(_) => REQUEST_ID,
            Self::SyncRequest(_) => SYNC_REQUEST_ID,
            Self::Block(_) => BLOCK_ID,
            Self::Transaction(_) => TRANSACTION_ID,
        }
    }
}

impl Serializer for Packet<'_> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            HANDSHAKE_ID => Self::Handshake(Cow::read(reader)?),
            CHAIN_SIZE_ID => Self::ChainSize(Cow::read(reader)?),
            GO_AWAY_ID => Self::GoAway(Cow::read(reader)?),
            TIME_ID => Self::Time(Cow::read(reader)?),
            NOTICE_ID => Self::Notice(Cow::read(reader)?),
            REQUEST_ID => Self::Request(Cow::read(reader)?),
            SYNC_REQUEST_ID => Self::SyncRequest(Cow::read(reader)?),
            BLOCK_ID => Self::Block(Cow::read(reader)?),
            TRANSACTION_ID => Self::Transaction(Cow::read(reader)?),
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.id());
        match self {
            Self::Handshake(handshake) => handshake.write(writer),
            Self::ChainSize(chain_size) => chain_size.write(writer),
            Self::GoAway(go_away) => go_away.write(writer),
            Self::Time(time) => time.write(writer),
            Self::Notice(notice) => notice.write(writer),
            Self::Request(request) => request.write(writer),
            Self::SyncRequest(sync_request) => sync_request.write(writer),
            Self::Block(block) => block.write(writer),
            Self::Transaction(tx) => tx.write(writer),
        }
    }

    fn size(&self) -> usize {
        let payload = match self {
            Self::Handshake(handshake) => handshake.size(),
            Self::ChainSize(chain_size) => chain_size.size(),
            Self::GoAway(go_away) => go_away.size(),
            Self::Time(time) => time.size(),
            Self::Notice(notice) => notice.size(),
            Self::Request(request) => request.size(),
            Self::SyncRequest(sync_request) => sync_request.size(),
            Self::Block(block) => block.size(),
            Self::Transaction(tx) => tx.size(),
        };
        // 1 for the id
        payload + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcadia_common::{
        block::BlockHeader,
        crypto::{hash, Hash, KeyPair, Signature},
    };
    use indexmap::IndexSet;
    use proptest::prelude::*;

    fn roundtrip(packet: Packet<'_>) {
        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), packet.size());
        assert_eq!(bytes[0], packet.id());
        let decoded = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_all_variants_roundtrip() {
        let keypair = KeyPair::generate();
        let mut handshake = Handshake {
            network_version: 1,
            chain_id: hash(b"chain"),
            node_id: hash(b"node"),
            key: keypair.public_key(),
            time: 42,
            token: Hash::zero(),
            sig: Signature::zero(),
            p2p_address: "127.0.0.1:2125".to_string(),
            last_irreversible_block_num: 1,
            last_irreversible_block_id: hash(b"lib"),
            head_num: 2,
            head_id: hash(b"head"),
            os: "linux".to_string(),
            agent: "arcadia".to_string(),
            generation: 1,
        };
        handshake.sign(&keypair);
        roundtrip(Packet::Handshake(Cow::Owned(handshake)));

        roundtrip(Packet::ChainSize(Cow::Owned(ChainSize {
            last_irreversible_block_num: 10,
            last_irreversible_block_id: hash(b"lib"),
            head_num: 12,
            head_id: hash(b"head"),
        })));

        roundtrip(Packet::GoAway(Cow::Owned(GoAway::new(
            GoAwayReason::WrongChain,
            hash(b"node"),
        ))));

        roundtrip(Packet::Time(Cow::Owned(TimeMessage {
            org: 1,
            rec: 2,
            xmt: 3,
            dst: 4,
        })));

        let mut ids = IndexSet::new();
        ids.insert(hash(b"tx"));
        roundtrip(Packet::Notice(Cow::Owned(Notice::transactions(
            SelectIds::normal(ids.clone()),
        ))));

        roundtrip(Packet::Request(Cow::Owned(Request {
            req_trx: SelectIds::normal(ids),
            req_blocks: SelectIds::default(),
        })));

        roundtrip(Packet::SyncRequest(Cow::Owned(SyncRequest::new(1, 100))));

        roundtrip(Packet::Block(Cow::Owned(SignedBlock {
            header: BlockHeader {
                previous: Hash::zero(),
                number: 7,
                timestamp: 1_700_000_000_000,
                producer: keypair.public_key(),
                transactions_root: Hash::zero(),
            },
            producer_signature: Signature::zero(),
            transactions: Vec::new(),
        })));

        roundtrip(Packet::Transaction(Cow::Owned(PackedTransaction {
            expiration: 1_700_000_000,
            payload: vec![1, 2, 3],
            signatures: Vec::new(),
        })));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        for tag in (MAX_PACKET_ID + 1)..=u8::MAX {
            assert!(Packet::from_bytes(&[tag]).is_err());
        }
    }

    proptest! {
        #[test]
        fn test_sync_request_roundtrip(start in 0u32..u32::MAX / 2, len in 0u32..10_000) {
            roundtrip(Packet::SyncRequest(Cow::Owned(SyncRequest::new(start, start + len))));
        }

        #[test]
        fn test_time_roundtrip(org: i64, rec: i64, xmt: i64, dst: i64) {
            roundtrip(Packet::Time(Cow::Owned(TimeMessage { org, rec, xmt, dst })));
        }

        #[test]
        fn test_transaction_roundtrip(expiration: u64, payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
            roundtrip(Packet::Transaction(Cow::Owned(PackedTransaction {
                expiration,
                payload,
                signatures: Vec::new(),
            })));
        }

        #[test]
        fn test_notice_roundtrip(seeds in proptest::collection::hash_set(any::<u64>(), 0..32), pending: u32) {
            let ids: IndexSet<Hash> = seeds.iter().map(|seed| hash(&seed.to_le_bytes())).collect();
            let notice = Notice {
                known_trx: SelectIds::new(IdListMode::CatchUp, pending, ids),
                known_blocks: SelectIds::default(),
            };
            roundtrip(Packet::Notice(Cow::Owned(notice)));
        }
    }
}

use super::select_ids::SelectIds;
use arcadia_common::{
    crypto::Hash,
    serializer::{Reader, ReaderError, Serializer, Writer},
};

// Advertises ids the sender holds so the recipient does not re-send them.
// Catch-up modes additionally steer the sync controller.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Notice {
    pub known_trx: SelectIds<Hash>,
    pub known_blocks: SelectIds<Hash>,
}

impl Notice {
    pub fn transactions(known_trx: SelectIds<Hash>) -> Self {
        Self {
            known_trx,
            ..Default::default()
        }
    }

    pub fn blocks(known_blocks: SelectIds<Hash>) -> Self {
        Self {
            known_blocks,
            ..Default::default()
        }
    }
}

impl Serializer for Notice {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let known_trx = SelectIds::read(reader)?;
        let known_blocks = SelectIds::read(reader)?;
        Ok(Self {
            known_trx,
            known_blocks,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.known_trx.write(writer);
        self.known_blocks.write(writer);
    }

    fn size(&self) -> usize {
        self.known_trx.size() + self.known_blocks.size()
    }
}

// Asks a peer for payloads it advertised. Unknown ids are silently skipped
// by the responder.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Request {
    pub req_trx: SelectIds<Hash>,
    pub req_blocks: SelectIds<Hash>,
}

impl Serializer for Request {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let req_trx = SelectIds::read(reader)?;
        let req_blocks = SelectIds::read(reader)?;
        Ok(Self {
            req_trx,
            req_blocks,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.req_trx.write(writer);
        self.req_blocks.write(writer);
    }

    fn size(&self) -> usize {
        self.req_trx.size() + self.req_blocks.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::p2p::packet::select_ids::IdListMode;
    use arcadia_common::crypto::hash;
    use indexmap::IndexSet;

    #[test]
    fn test_notice_roundtrip() {
        let mut trx = IndexSet::new();
        trx.insert(hash(b"t1"));
        let mut blocks = IndexSet::new();
        blocks.insert(hash(b"b1"));
        blocks.insert(hash(b"b2"));

        let notice = Notice {
            known_trx: SelectIds::normal(trx),
            known_blocks: SelectIds::new(IdListMode::CatchUp, 3, blocks),
        };
        let decoded = Notice::from_bytes(&notice.to_bytes()).unwrap();
        assert_eq!(notice, decoded);
    }

    #[test]
    fn test_request_roundtrip() {
        let mut trx = IndexSet::new();
        trx.insert(hash(b"t1"));
        let request = Request {
            req_trx: SelectIds::normal(trx),
            req_blocks: SelectIds::default(),
        };
        let decoded = Request::from_bytes(&request.to_bytes()).unwrap();
        assert_eq!(request, decoded);
    }
}

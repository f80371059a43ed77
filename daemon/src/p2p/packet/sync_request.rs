use arcadia_common::{
    block::BlockNum,
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use std::fmt;

// Asks a peer to stream blocks [start, end], both inclusive
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SyncRequest {
    pub start_block: BlockNum,
    pub end_block: BlockNum,
}

impl SyncRequest {
    pub fn new(start_block: BlockNum, end_block: BlockNum) -> Self {
        debug_assert!(end_block >= start_block);
        Self {
            start_block,
            end_block,
        }
    }

    pub fn len(&self) -> u64 {
        u64::from(self.end_block) - u64::from(self.start_block) + 1
    }
}

impl Serializer for SyncRequest {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let start_block = reader.read_u32()?;
        let end_block = reader.read_u32()?;
        if end_block < start_block {
            return Err(ReaderError::InvalidValue);
        }
        Ok(Self {
            start_block,
            end_block,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u32(&self.start_block);
        writer.write_u32(&self.end_block);
    }

    fn size(&self) -> usize {
        4 + 4
    }
}

impl fmt::Display for SyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncRequest[{}..={}]", self.start_block, self.end_block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let request = SyncRequest::new(1, 100);
        let decoded = SyncRequest::from_bytes(&request.to_bytes()).unwrap();
        assert_eq!(request, decoded);
        assert_eq!(request.len(), 100);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let request = SyncRequest {
            start_block: 10,
            end_block: 5,
        };
        assert!(SyncRequest::from_bytes(&request.to_bytes()).is_err());
    }
}

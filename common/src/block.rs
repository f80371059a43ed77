use crate::{
    crypto::{hash, Hash, PublicKey, Signature, HASH_SIZE},
    serializer::{Reader, ReaderError, Serializer, Writer},
    time::TimestampMillis,
    transaction::PackedTransaction,
};
use std::fmt;

// Block numbers are the u32 ordinal of the block in the chain
pub type BlockNum = u32;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BlockHeader {
    pub previous: Hash,
    pub number: BlockNum,
    pub timestamp: TimestampMillis,
    pub producer: PublicKey,
    pub transactions_root: Hash,
}

impl BlockHeader {
    // Block id: the header hash with the block number embedded big-endian
    // in the first four bytes, so the number can be recovered from the id
    // without a store lookup.
    pub fn id(&self) -> Hash {
        let mut bytes = hash(&self.to_bytes()).to_bytes();
        bytes[..4].copy_from_slice(&self.number.to_be_bytes());
        Hash::new(bytes)
    }
}

// Recover the block number embedded in a block id
pub fn block_num_from_id(id: &Hash) -> BlockNum {
    let bytes = id.as_bytes();
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

impl Serializer for BlockHeader {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let previous = reader.read_hash()?;
        let number = reader.read_u32()?;
        let timestamp = reader.read_u64()?;
        let producer = PublicKey::read(reader)?;
        let transactions_root = reader.read_hash()?;
        Ok(Self {
            previous,
            number,
            timestamp,
            producer,
            transactions_root,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.previous.write(writer);
        writer.write_u32(&self.number);
        writer.write_u64(&self.timestamp);
        self.producer.write(writer);
        self.transactions_root.write(writer);
    }

    fn size(&self) -> usize {
        HASH_SIZE + 4 + 8 + self.producer.size() + HASH_SIZE
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignedBlock {
    pub header: BlockHeader,
    pub producer_signature: Signature,
    pub transactions: Vec<PackedTransaction>,
}

impl SignedBlock {
    pub fn id(&self) -> Hash {
        self.header.id()
    }

    pub fn num(&self) -> BlockNum {
        self.header.number
    }
}

impl Serializer for SignedBlock {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let header = BlockHeader::read(reader)?;
        let producer_signature = Signature::read(reader)?;
        let transactions = Vec::read(reader)?;
        Ok(Self {
            header,
            producer_signature,
            transactions,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.header.write(writer);
        self.producer_signature.write(writer);
        self.transactions.write(writer);
    }

    fn size(&self) -> usize {
        self.header.size() + self.producer_signature.size() + self.transactions.size()
    }
}

impl fmt::Display for SignedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block[num: {}, id: {}]", self.num(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn dummy_block(number: BlockNum) -> SignedBlock {
        SignedBlock {
            header: BlockHeader {
                previous: Hash::zero(),
                number,
                timestamp: 1_700_000_000_000,
                producer: KeyPair::generate().public_key(),
                transactions_root: Hash::zero(),
            },
            producer_signature: Signature::zero(),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn test_block_roundtrip() {
        let block = dummy_block(42);
        let decoded = SignedBlock::from_bytes(&block.to_bytes()).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn test_block_num_embedded_in_id() {
        let block = dummy_block(0xDEAD_BEEF);
        assert_eq!(block_num_from_id(&block.id()), 0xDEAD_BEEF);
    }
}

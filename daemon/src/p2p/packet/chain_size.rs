use arcadia_common::{
    block::BlockNum,
    crypto::Hash,
    serializer::{Reader, ReaderError, Serializer, Writer},
};

// Advertises the sender's chain position so peers can detect lag without a
// full re-handshake
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChainSize {
    pub last_irreversible_block_num: BlockNum,
    pub last_irreversible_block_id: Hash,
    pub head_num: BlockNum,
    pub head_id: Hash,
}

impl Serializer for ChainSize {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let last_irreversible_block_num = reader.read_u32()?;
        let last_irreversible_block_id = reader.read_hash()?;
        let head_num = reader.read_u32()?;
        let head_id = reader.read_hash()?;
        Ok(Self {
            last_irreversible_block_num,
            last_irreversible_block_id,
            head_num,
            head_id,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u32(&self.last_irreversible_block_num);
        self.last_irreversible_block_id.write(writer);
        writer.write_u32(&self.head_num);
        self.head_id.write(writer);
    }

    fn size(&self) -> usize {
        4 + self.last_irreversible_block_id.size() + 4 + self.head_id.size()
    }
}

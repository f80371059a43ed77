mod defaults;
mod reader;
mod writer;

pub use reader::{Reader, ReaderError};
pub use writer::Writer;

// All types that go on the wire or in storage implement this trait.
// Encoding is deterministic: field order is fixed, integers are little
// endian, fixed-size hashes and keys are written as their canonical bytes.
pub trait Serializer {
    fn write(&self, writer: &mut Writer);

    fn read(reader: &mut Reader) -> Result<Self, ReaderError>
    where
        Self: Sized;

    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        self.write(&mut writer);
        writer.bytes()
    }

    fn to_hex(&self) -> String {
        let mut writer = Writer::new();
        self.write(&mut writer);
        hex::encode(writer.bytes())
    }

    fn from_hex(hex: &str) -> Result<Self, ReaderError>
    where
        Self: Sized,
    {
        match hex::decode(hex) {
            Ok(bytes) => {
                let mut reader = Reader::new(&bytes);
                Self::read(&mut reader)
            }
            Err(_) => Err(ReaderError::InvalidHex),
        }
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ReaderError>
    where
        Self: Sized,
    {
        let mut reader = Reader::new(bytes);
        Self::read(&mut reader)
    }

    // Size in bytes of the serialized representation
    fn size(&self) -> usize {
        self.to_bytes().len()
    }
}

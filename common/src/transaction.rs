use crate::{
    crypto::{Hash, Hashable, Signature},
    serializer::{Reader, ReaderError, Serializer, Writer},
    time::TimestampSeconds,
};
use std::fmt;

// Hard cap on the opaque action payload carried by one transaction
pub const MAX_TRANSACTION_PAYLOAD: usize = 2 * 1024 * 1024;

// A transaction as it travels the wire: an expiration, the packed action
// data (opaque to the network layer) and the authorizing signatures.
// Validation is the chain controller's job; the network only hashes,
// de-duplicates and relays.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PackedTransaction {
    pub expiration: TimestampSeconds,
    pub payload: Vec<u8>,
    pub signatures: Vec<Signature>,
}

impl PackedTransaction {
    pub fn id(&self) -> Hash {
        Hashable::hash(self)
    }
}

impl Serializer for PackedTransaction {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let expiration = reader.read_u64()?;
        let len = reader.read_u32()? as usize;
        if len > MAX_TRANSACTION_PAYLOAD {
            return Err(ReaderError::InvalidValue);
        }
        let payload = reader.read_bytes(len)?;
        let signatures = Vec::read(reader)?;
        Ok(Self {
            expiration,
            payload,
            signatures,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(&self.expiration);
        writer.write_u32(&(self.payload.len() as u32));
        writer.write_bytes(&self.payload);
        self.signatures.write(writer);
    }

    fn size(&self) -> usize {
        8 + 4 + self.payload.len() + self.signatures.size()
    }
}

impl Hashable for PackedTransaction {}

impl fmt::Display for PackedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction[id: {}, payload: {} bytes]",
            self.id(),
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_transaction_roundtrip() {
        let tx = PackedTransaction {
            expiration: 1_700_000_000,
            payload: vec![1, 2, 3, 4],
            signatures: vec![KeyPair::generate().sign(b"data")],
        };
        let decoded = PackedTransaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(tx, decoded);
        assert_eq!(tx.id(), decoded.id());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut writer = crate::serializer::Writer::new();
        writer.write_u64(&0);
        writer.write_u32(&((MAX_TRANSACTION_PAYLOAD + 1) as u32));
        assert!(PackedTransaction::from_bytes(writer.as_bytes()).is_err());
    }
}

use crate::config::{MAX_HANDSHAKE_STR_LENGTH, MAX_P2P_ADDRESS_LENGTH};
use arcadia_common::{
    block::BlockNum,
    crypto::{hash, Hash, KeyPair, PublicKey, Signature},
    serializer::{Reader, ReaderError, Serializer, Writer},
    time::TimestampNanos,
};
use std::fmt;

// First packet on every connection: authenticates the peer and states its
// chain identity and position. Field order is fixed by the wire format.
#[derive(Clone, PartialEq, Debug)]
pub struct Handshake {
    pub network_version: u16,
    pub chain_id: Hash,
    pub node_id: Hash,
    pub key: PublicKey,
    pub time: TimestampNanos,
    pub token: Hash,
    pub sig: Signature,
    pub p2p_address: String,
    pub last_irreversible_block_num: BlockNum,
    pub last_irreversible_block_id: Hash,
    pub head_num: BlockNum,
    pub head_id: Hash,
    pub os: String,
    pub agent: String,
    // Incremented each time the same peer re-handshakes on a connection
    pub generation: i16,
}

impl Handshake {
    // The signed token binds the handshake to its timestamp
    pub fn token_for(time: TimestampNanos) -> Hash {
        hash(&time.to_le_bytes())
    }

    pub fn sign(&mut self, keypair: &KeyPair) {
        self.token = Self::token_for(self.time);
        self.sig = keypair.sign(self.token.as_bytes());
    }

    // Recomputes the token from the stated time and checks the signature
    // against the stated key. A mismatched token is an authentication
    // failure just like a bad signature.
    pub fn verify_signature(&self) -> bool {
        if self.token != Self::token_for(self.time) {
            return false;
        }
        self.key.verify(self.token.as_bytes(), &self.sig)
    }
}

impl Serializer for Handshake {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let network_version = reader.read_u16()?;
        let chain_id = reader.read_hash()?;
        let node_id = reader.read_hash()?;
        let key = PublicKey::read(reader)?;
        let time = reader.read_i64()?;
        let token = reader.read_hash()?;
        let sig = Signature::read(reader)?;

        let p2p_address = reader.read_string()?;
        if p2p_address.len() > MAX_P2P_ADDRESS_LENGTH {
            return Err(ReaderError::InvalidValue);
        }

        let last_irreversible_block_num = reader.read_u32()?;
        let last_irreversible_block_id = reader.read_hash()?;
        let head_num = reader.read_u32()?;
        let head_id = reader.read_hash()?;

        let os = reader.read_string()?;
        if os.len() > MAX_HANDSHAKE_STR_LENGTH {
            return Err(ReaderError::InvalidValue);
        }
        let agent = reader.read_string()?;
        if agent.len() > MAX_HANDSHAKE_STR_LENGTH {
            return Err(ReaderError::InvalidValue);
        }

        let generation = reader.read_i16()?;

        Ok(Self {
            network_version,
            chain_id,
            node_id,
            key,
            time,
            token,
            sig,
            p2p_address,
            last_irreversible_block_num,
            last_irreversible_block_id,
            head_num,
            head_id,
            os,
            agent,
            generation,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u16(self.network_version);
        self.chain_id.write(writer);
        self.node_id.write(writer);
        self.key.write(writer);
        writer.write_i64(&self.time);
        self.token.write(writer);
        self.sig.write(writer);
        writer.write_string(&self.p2p_address);
        writer.write_u32(&self.last_irreversible_block_num);
        self.last_irreversible_block_id.write(writer);
        writer.write_u32(&self.head_num);
        self.head_id.write(writer);
        writer.write_string(&self.os);
        writer.write_string(&self.agent);
        writer.write_i16(self.generation);
    }

    fn size(&self) -> usize {
        2 + self.chain_id.size()
            + self.node_id.size()
            + self.key.size()
            + 8
            + self.token.size()
            + self.sig.size()
            + 2
            + self.p2p_address.len()
            + 4
            + self.last_irreversible_block_id.size()
            + 4
            + self.head_id.size()
            + 2
            + self.os.len()
            + 2
            + self.agent.len()
            + 2
    }
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handshake[node: {}, address: {}, head: {}, lib: {}, agent: {}]",
            self.node_id, self.p2p_address, self.head_num, self.last_irreversible_block_num,
            self.agent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcadia_common::time::get_current_time_in_nanos;

    pub fn dummy_handshake(keypair: &KeyPair) -> Handshake {
        let mut handshake = Handshake {
            network_version: 1,
            chain_id: hash(b"chain"),
            node_id: hash(b"node"),
            key: keypair.public_key(),
            time: get_current_time_in_nanos(),
            token: Hash::zero(),
            sig: Signature::zero(),
            p2p_address: "127.0.0.1:2125".to_string(),
            last_irreversible_block_num: 10,
            last_irreversible_block_id: hash(b"lib"),
            head_num: 12,
            head_id: hash(b"head"),
            os: "linux".to_string(),
            agent: "arcadia test".to_string(),
            generation: 0,
        };
        handshake.sign(keypair);
        handshake
    }

    #[test]
    fn test_roundtrip() {
        let handshake = dummy_handshake(&KeyPair::generate());
        let decoded = Handshake::from_bytes(&handshake.to_bytes()).unwrap();
        assert_eq!(handshake, decoded);
        assert_eq!(handshake.to_bytes().len(), handshake.size());
    }

    #[test]
    fn test_signature_verification() {
        let mut handshake = dummy_handshake(&KeyPair::generate());
        assert!(handshake.verify_signature());

        // a re-stamped time invalidates the token
        handshake.time += 1;
        assert!(!handshake.verify_signature());
    }

    #[test]
    fn test_signature_of_other_key_rejected() {
        let mut handshake = dummy_handshake(&KeyPair::generate());
        handshake.key = KeyPair::generate().public_key();
        assert!(!handshake.verify_signature());
    }

    #[test]
    fn test_oversized_address_rejected() {
        let mut handshake = dummy_handshake(&KeyPair::generate());
        handshake.p2p_address = "a".repeat(MAX_P2P_ADDRESS_LENGTH + 1);
        assert!(Handshake::from_bytes(&handshake.to_bytes()).is_err());
    }

    #[test]
    fn test_oversized_agent_rejected() {
        let mut handshake = dummy_handshake(&KeyPair::generate());
        handshake.agent = "a".repeat(MAX_HANDSHAKE_STR_LENGTH + 1);
        assert!(Handshake::from_bytes(&handshake.to_bytes()).is_err());
    }
}

use arcadia_common::{
    crypto::Hash,
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use std::fmt;

// Reason a peer is terminating the connection. Wire ordinals are fixed;
// the strings appear in logs and status output.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum GoAwayReason {
    NoReason = 0,
    SelfConnect = 1,
    Duplicate = 2,
    WrongChain = 3,
    WrongVersion = 4,
    Forked = 5,
    Unlinkable = 6,
    BadTransaction = 7,
    Validation = 8,
    BenignOther = 9,
    FatalOther = 10,
    Authentication = 11,
}

impl GoAwayReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoReason => "no reason",
            Self::SelfConnect => "self connect",
            Self::Duplicate => "duplicate",
            Self::WrongChain => "wrong chain",
            Self::WrongVersion => "wrong version",
            Self::Forked => "chain is forked",
            Self::Unlinkable => "unlinkable block received",
            Self::BadTransaction => "bad transaction",
            Self::Validation => "invalid block",
            Self::Authentication => "authentication failure",
            Self::FatalOther => "some other failure",
            Self::BenignOther => "some other non-fatal condition, possibly unknown block",
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::NoReason,
            1 => Self::SelfConnect,
            2 => Self::Duplicate,
            3 => Self::WrongChain,
            4 => Self::WrongVersion,
            5 => Self::Forked,
            6 => Self::Unlinkable,
            7 => Self::BadTransaction,
            8 => Self::Validation,
            9 => Self::BenignOther,
            10 => Self::FatalOther,
            11 => Self::Authentication,
            _ => return None,
        })
    }
}

impl fmt::Display for GoAwayReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serializer for GoAwayReason {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Self::from_u8(reader.read_u8()?).ok_or(ReaderError::InvalidValue)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(*self as u8);
    }

    fn size(&self) -> usize {
        1
    }
}

// Terminal packet: the sender closes after flushing it
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GoAway {
    pub reason: GoAwayReason,
    pub node_id: Hash,
}

impl GoAway {
    pub fn new(reason: GoAwayReason, node_id: Hash) -> Self {
        Self { reason, node_id }
    }
}

impl Serializer for GoAway {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let reason = GoAwayReason::read(reader)?;
        let node_id = reader.read_hash()?;
        Ok(Self { reason, node_id })
    }

    fn write(&self, writer: &mut Writer) {
        self.reason.write(writer);
        self.node_id.write(writer);
    }

    fn size(&self) -> usize {
        self.reason.size() + self.node_id.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcadia_common::crypto::hash;

    #[test]
    fn test_reason_strings() {
        assert_eq!(GoAwayReason::NoReason.as_str(), "no reason");
        assert_eq!(GoAwayReason::SelfConnect.as_str(), "self connect");
        assert_eq!(GoAwayReason::Duplicate.as_str(), "duplicate");
        assert_eq!(GoAwayReason::WrongChain.as_str(), "wrong chain");
        assert_eq!(GoAwayReason::WrongVersion.as_str(), "wrong version");
        assert_eq!(GoAwayReason::Forked.as_str(), "chain is forked");
        assert_eq!(GoAwayReason::Unlinkable.as_str(), "unlinkable block received");
        assert_eq!(GoAwayReason::BadTransaction.as_str(), "bad transaction");
        assert_eq!(GoAwayReason::Validation.as_str(), "invalid block");
        assert_eq!(
            GoAwayReason::Authentication.as_str(),
            "authentication failure"
        );
        assert_eq!(GoAwayReason::FatalOther.as_str(), "some other failure");
        assert_eq!(
            GoAwayReason::BenignOther.as_str(),
            "some other non-fatal condition, possibly unknown block"
        );
    }

    #[test]
    fn test_roundtrip() {
        for value in 0..=11u8 {
            let reason = GoAwayReason::from_u8(value).unwrap();
            let go_away = GoAway::new(reason, hash(b"node"));
            let decoded = GoAway::from_bytes(&go_away.to_bytes()).unwrap();
            assert_eq!(go_away, decoded);
        }
        assert!(GoAwayReason::from_u8(12).is_none());
    }
}

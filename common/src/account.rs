// Account naming and authority structures mirrored from committed chain
// state. A permission is identified by its (account, permission name) pair
// and grants signing weight to keys and to other permission levels.

use crate::{
    crypto::PublicKey,
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use serde::{Deserialize, Serialize};
use std::fmt;

// Account and permission names share the same constraints on the wire
pub const MAX_NAME_LENGTH: usize = 64;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountName(String);

impl AccountName {
    pub fn new(name: impl Into<String>) -> Result<Self, ReaderError> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Err(ReaderError::InvalidValue);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serializer for AccountName {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let name = reader.read_string()?;
        Self::new(name)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_string(&self.0);
    }

    fn size(&self) -> usize {
        2 + self.0.len()
    }
}

// The (actor, permission) pair identifying an authority on chain.
// An empty permission name means "any permission of that actor" in queries.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: AccountName,
    pub permission: String,
}

impl PermissionLevel {
    pub fn new(actor: AccountName, permission: impl Into<String>) -> Self {
        Self {
            actor,
            permission: permission.into(),
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.permission.is_empty() {
            write!(f, "{}", self.actor)
        } else {
            write!(f, "{}@{}", self.actor, self.permission)
        }
    }
}

impl Serializer for PermissionLevel {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let actor = AccountName::read(reader)?;
        let permission = reader.read_string()?;
        if permission.len() > MAX_NAME_LENGTH {
            return Err(ReaderError::InvalidValue);
        }
        Ok(Self { actor, permission })
    }

    fn write(&self, writer: &mut Writer) {
        self.actor.write(writer);
        writer.write_string(&self.permission);
    }

    fn size(&self) -> usize {
        self.actor.size() + 2 + self.permission.len()
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct KeyWeight {
    pub key: PublicKey,
    pub weight: u16,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PermissionLevelWeight {
    pub permission: PermissionLevel,
    pub weight: u16,
}

// The full authority behind one (account, permission):
// keys and delegated permission levels weighted against a threshold
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Authority {
    pub threshold: u32,
    pub keys: Vec<KeyWeight>,
    pub accounts: Vec<PermissionLevelWeight>,
}

impl Serializer for KeyWeight {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let key = PublicKey::read(reader)?;
        let weight = reader.read_u16()?;
        Ok(Self { key, weight })
    }

    fn write(&self, writer: &mut Writer) {
        self.key.write(writer);
        writer.write_u16(self.weight);
    }

    fn size(&self) -> usize {
        self.key.size() + 2
    }
}

impl Serializer for PermissionLevelWeight {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let permission = PermissionLevel::read(reader)?;
        let weight = reader.read_u16()?;
        Ok(Self { permission, weight })
    }

    fn write(&self, writer: &mut Writer) {
        self.permission.write(writer);
        writer.write_u16(self.weight);
    }

    fn size(&self) -> usize {
        self.permission.size() + 2
    }
}

impl Serializer for Authority {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let threshold = reader.read_u32()?;
        if threshold == 0 {
            return Err(ReaderError::InvalidValue);
        }
        let keys = Vec::read(reader)?;
        let accounts = Vec::read(reader)?;
        Ok(Self {
            threshold,
            keys,
            accounts,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u32(&self.threshold);
        self.keys.write(writer);
        self.accounts.write(writer);
    }

    fn size(&self) -> usize {
        4 + self.keys.size() + self.accounts.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_name_bounds() {
        assert!(AccountName::new("").is_err());
        assert!(AccountName::new("a".repeat(MAX_NAME_LENGTH + 1)).is_err());
        assert!(AccountName::new("alice").is_ok());
    }

    #[test]
    fn test_authority_roundtrip() {
        let authority = Authority {
            threshold: 2,
            keys: vec![KeyWeight {
                key: KeyPair::generate().public_key(),
                weight: 1,
            }],
            accounts: vec![PermissionLevelWeight {
                permission: PermissionLevel::new(AccountName::new("bob").unwrap(), "active"),
                weight: 1,
            }],
        };
        let decoded = Authority::from_bytes(&authority.to_bytes()).unwrap();
        assert_eq!(authority, decoded);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let authority = Authority {
            threshold: 0,
            keys: vec![],
            accounts: vec![],
        };
        assert!(Authority::from_bytes(&authority.to_bytes()).is_err());
    }
}

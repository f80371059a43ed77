// DTOs for the daemon RPC surface. The network layer fills these; the host
// application decides how to expose them over HTTP.

use crate::{
    account::{AccountName, PermissionLevel},
    crypto::{Hash, PublicKey},
    time::TimestampNanos,
};
use serde::de::Error as SerdeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer as SerdeSerializer};

// Tracks on which side of a connection an id became known.
// Used by the per-peer knowledge caches to decide relay eligibility.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Direction {
    // Received from the peer
    In,
    // Sent to the peer
    Out,
    // Both directions
    Both,
}

impl Direction {
    // Merge a new observation, returns true when the entry changed
    pub fn update(&mut self, other: Direction) -> bool {
        match (*self, other) {
            (Direction::Both, _) => false,
            (current, new) if current == new => false,
            _ => {
                *self = Direction::Both;
                true
            }
        }
    }
}

// Snapshot of a validated handshake, kept for status reporting
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct HandshakeInfo {
    pub network_version: u16,
    pub node_id: Hash,
    pub p2p_address: String,
    pub last_irreversible_block_num: u32,
    pub last_irreversible_block_id: Hash,
    pub head_num: u32,
    pub head_id: Hash,
    pub os: String,
    pub agent: String,
    pub generation: i16,
    pub time: TimestampNanos,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub peer: String,
    pub connecting: bool,
    pub syncing: bool,
    pub last_handshake: Option<HandshakeInfo>,
}

// A permission level as it appears in the authorizers query: either a bare
// actor string (matches every permission of that actor) or an
// {actor, permission} object (exact match). Parsed into the sum and
// normalized to (actor, Option<permission>) by the query layer.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct QueryPermissionLevel {
    pub actor: AccountName,
    pub permission: Option<String>,
}

impl QueryPermissionLevel {
    pub fn matches(&self, level: &PermissionLevel) -> bool {
        self.actor == level.actor
            && self
                .permission
                .as_ref()
                .map_or(true, |p| *p == level.permission)
    }
}

impl Serialize for QueryPermissionLevel {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.permission {
            None => serializer.serialize_str(self.actor.as_str()),
            Some(permission) => {
                use serde::ser::SerializeStruct;
                let mut state = serializer.serialize_struct("QueryPermissionLevel", 2)?;
                state.serialize_field("actor", self.actor.as_str())?;
                state.serialize_field("permission", permission)?;
                state.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for QueryPermissionLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(actor) => Ok(Self {
                actor: AccountName::new(actor)
                    .map_err(|_| SerdeError::custom("Invalid actor name"))?,
                permission: None,
            }),
            serde_json::Value::Object(map) => {
                let actor = match map.get("actor") {
                    Some(serde_json::Value::String(actor)) => AccountName::new(actor.clone())
                        .map_err(|_| SerdeError::custom("Invalid actor name"))?,
                    Some(_) => return Err(SerdeError::custom("Invalid actor field")),
                    None => return Err(SerdeError::custom("Missing actor field")),
                };

                let permission = match map.get("permission") {
                    Some(serde_json::Value::String(permission)) => {
                        if map.len() != 2 {
                            return Err(SerdeError::custom("Unrecognized fields in account"));
                        }
                        Some(permission.clone())
                    }
                    Some(_) => return Err(SerdeError::custom("Invalid permission field")),
                    None => {
                        if map.len() != 1 {
                            return Err(SerdeError::custom("Unrecognized fields in account"));
                        }
                        None
                    }
                };

                Ok(Self { actor, permission })
            }
            _ => Err(SerdeError::custom(
                "Expected string or object for permission level",
            )),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub struct GetAccountsByAuthorizersParams {
    #[serde(default)]
    pub accounts: Vec<QueryPermissionLevel>,
    #[serde(default)]
    pub keys: Vec<PublicKey>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AuthorizedAccountResult {
    pub account_name: AccountName,
    pub permission_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizing_account: Option<PermissionLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizing_key: Option<PublicKey>,
    pub weight: u16,
    pub threshold: u32,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, Default)]
pub struct GetAccountsByAuthorizersResult {
    pub accounts: Vec<AuthorizedAccountResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_update() {
        let mut direction = Direction::In;
        assert!(!direction.update(Direction::In));
        assert!(direction.update(Direction::Out));
        assert_eq!(direction, Direction::Both);
        assert!(!direction.update(Direction::In));
    }

    #[test]
    fn test_permission_level_from_string() {
        let level: QueryPermissionLevel = serde_json::from_str(r#""alice""#).unwrap();
        assert_eq!(level.actor.as_str(), "alice");
        assert_eq!(level.permission, None);
    }

    #[test]
    fn test_permission_level_from_object() {
        let level: QueryPermissionLevel =
            serde_json::from_str(r#"{"actor": "alice", "permission": "active"}"#).unwrap();
        assert_eq!(level.actor.as_str(), "alice");
        assert_eq!(level.permission.as_deref(), Some("active"));
    }

    #[test]
    fn test_permission_level_missing_actor() {
        let result: Result<QueryPermissionLevel, _> =
            serde_json::from_str(r#"{"permission": "active"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_permission_level_extra_fields() {
        let result: Result<QueryPermissionLevel, _> =
            serde_json::from_str(r#"{"actor": "alice", "permission": "active", "x": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_permission_level_serialize_shapes() {
        let bare = QueryPermissionLevel {
            actor: AccountName::new("alice").unwrap(),
            permission: None,
        };
        assert_eq!(serde_json::to_string(&bare).unwrap(), r#""alice""#);

        let full = QueryPermissionLevel {
            actor: AccountName::new("alice").unwrap(),
            permission: Some("active".to_string()),
        };
        assert_eq!(
            serde_json::to_string(&full).unwrap(),
            r#"{"actor":"alice","permission":"active"}"#
        );
    }
}

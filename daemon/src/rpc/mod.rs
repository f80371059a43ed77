// RPC handlers for the network status surface and the authority query.
// The host application owns the HTTP layer; these functions are the seam
// it mounts. A handler error never tears down the connection.

use crate::{
    core::{authority::AuthorityIndex, ChainController},
    p2p::P2pServer,
};
use arcadia_common::api::daemon::GetAccountsByAuthorizersParams;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InternalRpcError {
    // 400-class: the request body does not parse into the expected shape
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InternalRpcError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::InvalidParams(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

pub fn parse_params<T: DeserializeOwned>(value: Value) -> Result<T, InternalRpcError> {
    serde_json::from_value(value).map_err(|e| InternalRpcError::InvalidRequest(e.to_string()))
}

#[derive(Deserialize)]
struct EndpointParams {
    endpoint: String,
}

pub async fn connect<C: ChainController>(
    p2p: &Arc<P2pServer<C>>,
    params: Value,
) -> Result<Value, InternalRpcError> {
    let params: EndpointParams = parse_params(params)?;
    Ok(json!(p2p.connect(&params.endpoint).await))
}

pub async fn disconnect<C: ChainController>(
    p2p: &Arc<P2pServer<C>>,
    params: Value,
) -> Result<Value, InternalRpcError> {
    let params: EndpointParams = parse_params(params)?;
    Ok(json!(p2p.disconnect(&params.endpoint).await))
}

pub async fn status<C: ChainController>(
    p2p: &Arc<P2pServer<C>>,
    params: Value,
) -> Result<Value, InternalRpcError> {
    let params: EndpointParams = parse_params(params)?;
    serde_json::to_value(p2p.status(&params.endpoint).await)
        .map_err(|e| InternalRpcError::Internal(e.to_string()))
}

pub async fn connections<C: ChainController>(
    p2p: &Arc<P2pServer<C>>,
) -> Result<Value, InternalRpcError> {
    serde_json::to_value(p2p.connections().await)
        .map_err(|e| InternalRpcError::Internal(e.to_string()))
}

pub async fn get_accounts_by_authorizers(
    authority: &Arc<RwLock<AuthorityIndex>>,
    params: Value,
) -> Result<Value, InternalRpcError> {
    let params: GetAccountsByAuthorizersParams = parse_params(params)?;
    let result = {
        let index = authority
            .read()
            .map_err(|e| InternalRpcError::Internal(e.to_string()))?;
        index.get_accounts_by_authorizers(&params)
    };
    serde_json::to_value(result).map_err(|e| InternalRpcError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::authority::PermissionOp;
    use arcadia_common::{
        account::{AccountName, Authority, KeyWeight},
        crypto::KeyPair,
    };

    fn index_with_alice() -> Arc<RwLock<AuthorityIndex>> {
        let mut index = AuthorityIndex::new();
        index.commit_block(
            1,
            &[PermissionOp::Set {
                account: AccountName::new("alice").unwrap(),
                permission: "active".to_string(),
                authority: Authority {
                    threshold: 1,
                    keys: vec![KeyWeight {
                        key: KeyPair::generate().public_key(),
                        weight: 1,
                    }],
                    accounts: Vec::new(),
                },
            }],
        );
        Arc::new(RwLock::new(index))
    }

    #[tokio::test]
    async fn test_query_rejects_missing_actor() {
        let authority = index_with_alice();
        let result = get_accounts_by_authorizers(
            &authority,
            json!({"accounts": [{"permission": "active"}], "keys": []}),
        )
        .await;
        match result {
            Err(e @ InternalRpcError::InvalidRequest(_)) => assert_eq!(e.http_status(), 400),
            other => panic!("expected invalid request, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_query_rejects_unknown_fields() {
        let authority = index_with_alice();
        let result = get_accounts_by_authorizers(
            &authority,
            json!({"accounts": [{"actor": "alice", "permission": "active", "extra": 1}], "keys": []}),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_query_bare_actor_shape() {
        let authority = index_with_alice();
        let result = get_accounts_by_authorizers(
            &authority,
            json!({"accounts": ["alice"], "keys": []}),
        )
        .await
        .unwrap();
        // alice authorizes nothing, so the row set is empty
        assert_eq!(result["accounts"].as_array().unwrap().len(), 0);
    }
}

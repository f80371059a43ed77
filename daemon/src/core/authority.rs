// Secondary index over committed chain state answering "which accounts are
// controlled by these keys or authorizers". Mutated only on block commit;
// a per-block delta log supports rollback when a fork reverts blocks.

use arcadia_common::{
    account::{AccountName, Authority, PermissionLevel},
    api::daemon::{
        AuthorizedAccountResult, GetAccountsByAuthorizersParams, GetAccountsByAuthorizersResult,
    },
    block::BlockNum,
    crypto::PublicKey,
};
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};

type PermissionKey = (AccountName, String);

// One permission-modifying action extracted from a committed block,
// applied in block order
#[derive(Clone, Debug, PartialEq)]
pub enum PermissionOp {
    Set {
        account: AccountName,
        permission: String,
        authority: Authority,
    },
    Remove {
        account: AccountName,
        permission: String,
    },
}

// Previous value of one permission, recorded before a block mutates it
struct DeltaEntry {
    key: PermissionKey,
    previous: Option<Authority>,
}

#[derive(Default)]
pub struct AuthorityIndex {
    // current state at the last committed block
    permissions: HashMap<PermissionKey, Authority>,
    // key -> permissions listing it
    by_key: HashMap<PublicKey, HashSet<PermissionKey>>,
    // authorizing permission level -> permissions delegating to it
    by_authorizer: HashMap<PermissionLevel, HashSet<PermissionKey>>,
    // per-block undo log, oldest first, pruned at the irreversible block
    deltas: VecDeque<(BlockNum, Vec<DeltaEntry>)>,
}

impl AuthorityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // Apply the permission ops of one committed block, in order.
    // Must be called with strictly increasing block numbers between
    // rollbacks.
    pub fn commit_block(&mut self, num: BlockNum, ops: &[PermissionOp]) {
        let mut delta = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                PermissionOp::Set {
                    account,
                    permission,
                    authority,
                } => {
                    let key = (account.clone(), permission.clone());
                    let previous = self.set_permission(key.clone(), authority.clone());
                    delta.push(DeltaEntry { key, previous });
                }
                PermissionOp::Remove {
                    account,
                    permission,
                } => {
                    let key = (account.clone(), permission.clone());
                    let previous = self.remove_permission(&key);
                    delta.push(DeltaEntry { key, previous });
                }
            }
        }
        self.deltas.push_back((num, delta));
    }

    // Undo every block above `num`, most recent first.
    // Called by the chain controller before it reapplies the fork branch.
    pub fn rollback_to(&mut self, num: BlockNum) {
        while let Some((block_num, _)) = self.deltas.back() {
            if *block_num <= num {
                break;
            }
            let (block_num, delta) = self.deltas.pop_back().expect("checked non-empty");
            debug!("rolling back authority delta of block {}", block_num);
            for entry in delta.into_iter().rev() {
                match entry.previous {
                    Some(authority) => {
                        self.set_permission(entry.key, authority);
                    }
                    None => {
                        self.remove_permission(&entry.key);
                    }
                }
            }
        }
    }

    // Drop undo entries at or below the irreversible block: those blocks
    // can no longer be reverted
    pub fn prune_irreversible(&mut self, lib: BlockNum) {
        while let Some((block_num, _)) = self.deltas.front() {
            if *block_num > lib {
                break;
            }
            self.deltas.pop_front();
        }
    }

    pub fn get_accounts_by_authorizers(
        &self,
        params: &GetAccountsByAuthorizersParams,
    ) -> GetAccountsByAuthorizersResult {
        let mut accounts = Vec::new();

        for key in &params.keys {
            let Some(targets) = self.by_key.get(key) else {
                continue;
            };
            for target in targets {
                let Some(authority) = self.permissions.get(target) else {
                    continue;
                };
                for kw in authority.keys.iter().filter(|kw| kw.key == *key) {
                    accounts.push(AuthorizedAccountResult {
                        account_name: target.0.clone(),
                        permission_name: target.1.clone(),
                        authorizing_account: None,
                        authorizing_key: Some(key.clone()),
                        weight: kw.weight,
                        threshold: authority.threshold,
                    });
                }
            }
        }

        for query in &params.accounts {
            for (level, targets) in &self.by_authorizer {
                if !query.matches(level) {
                    continue;
                }
                for target in targets {
                    let Some(authority) = self.permissions.get(target) else {
                        continue;
                    };
                    for plw in authority
                        .accounts
                        .iter()
                        .filter(|plw| plw.permission == *level)
                    {
                        accounts.push(AuthorizedAccountResult {
                            account_name: target.0.clone(),
                            permission_name: target.1.clone(),
                            authorizing_account: Some(level.clone()),
                            authorizing_key: None,
                            weight: plw.weight,
                            threshold: authority.threshold,
                        });
                    }
                }
            }
        }

        GetAccountsByAuthorizersResult { accounts }
    }

    fn set_permission(&mut self, key: PermissionKey, authority: Authority) -> Option<Authority> {
        let previous = self.permissions.insert(key.clone(), authority.clone());
        if let Some(previous) = &previous {
            self.unindex(&key, previous);
        }
        self.index(&key, &authority);
        previous
    }

    fn remove_permission(&mut self, key: &PermissionKey) -> Option<Authority> {
        let previous = self.permissions.remove(key);
        if let Some(previous) = &previous {
            self.unindex(key, previous);
        }
        previous
    }

    fn index(&mut self, key: &PermissionKey, authority: &Authority) {
        for kw in &authority.keys {
            self.by_key
                .entry(kw.key.clone())
                .or_default()
                .insert(key.clone());
        }
        for plw in &authority.accounts {
            self.by_authorizer
                .entry(plw.permission.clone())
                .or_default()
                .insert(key.clone());
        }
    }

    fn unindex(&mut self, key: &PermissionKey, authority: &Authority) {
        for kw in &authority.keys {
            if let Some(set) = self.by_key.get_mut(&kw.key) {
                set.remove(key);
                if set.is_empty() {
                    self.by_key.remove(&kw.key);
                }
            }
        }
        for plw in &authority.accounts {
            if let Some(set) = self.by_authorizer.get_mut(&plw.permission) {
                set.remove(key);
                if set.is_empty() {
                    self.by_authorizer.remove(&plw.permission);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcadia_common::{
        account::{KeyWeight, PermissionLevelWeight},
        api::daemon::QueryPermissionLevel,
        crypto::KeyPair,
    };

    fn name(value: &str) -> AccountName {
        AccountName::new(value).unwrap()
    }

    fn key_authority(threshold: u32, keys: &[(PublicKey, u16)]) -> Authority {
        Authority {
            threshold,
            keys: keys
                .iter()
                .map(|(key, weight)| KeyWeight {
                    key: key.clone(),
                    weight: *weight,
                })
                .collect(),
            accounts: Vec::new(),
        }
    }

    #[test]
    fn test_query_by_account_returns_all_permissions_and_keys() {
        let (k1, k2, k3) = (
            KeyPair::generate().public_key(),
            KeyPair::generate().public_key(),
            KeyPair::generate().public_key(),
        );

        let mut index = AuthorityIndex::new();
        index.commit_block(
            1,
            &[
                PermissionOp::Set {
                    account: name("alice"),
                    permission: "active".to_string(),
                    authority: key_authority(2, &[(k1.clone(), 1), (k2.clone(), 1)]),
                },
                PermissionOp::Set {
                    account: name("alice"),
                    permission: "owner".to_string(),
                    authority: key_authority(1, &[(k3.clone(), 1)]),
                },
            ],
        );

        // Query every key so both permissions of alice are covered
        let result = index.get_accounts_by_authorizers(&GetAccountsByAuthorizersParams {
            accounts: Vec::new(),
            keys: vec![k1, k2, k3],
        });

        assert_eq!(result.accounts.len(), 3);
        assert!(result
            .accounts
            .iter()
            .all(|row| row.account_name.as_str() == "alice"));
        assert!(result.accounts.iter().all(|row| row.authorizing_account.is_none()));
        assert!(result.accounts.iter().all(|row| row.authorizing_key.is_some()));
        assert_eq!(
            result
                .accounts
                .iter()
                .filter(|row| row.permission_name == "active" && row.threshold == 2)
                .count(),
            2
        );
        assert_eq!(
            result
                .accounts
                .iter()
                .filter(|row| row.permission_name == "owner" && row.threshold == 1)
                .count(),
            1
        );
    }

    #[test]
    fn test_query_by_authorizer_bare_and_exact() {
        let mut index = AuthorityIndex::new();
        let delegated = Authority {
            threshold: 1,
            keys: Vec::new(),
            accounts: vec![PermissionLevelWeight {
                permission: PermissionLevel::new(name("alice"), "active"),
                weight: 1,
            }],
        };
        index.commit_block(
            1,
            &[PermissionOp::Set {
                account: name("treasury"),
                permission: "spend".to_string(),
                authority: delegated,
            }],
        );

        // bare actor matches any permission of that actor
        let bare = index.get_accounts_by_authorizers(&GetAccountsByAuthorizersParams {
            accounts: vec![QueryPermissionLevel {
                actor: name("alice"),
                permission: None,
            }],
            keys: Vec::new(),
        });
        assert_eq!(bare.accounts.len(), 1);
        let row = &bare.accounts[0];
        assert_eq!(row.account_name.as_str(), "treasury");
        assert_eq!(row.permission_name, "spend");
        assert_eq!(
            row.authorizing_account,
            Some(PermissionLevel::new(name("alice"), "active"))
        );
        assert!(row.authorizing_key.is_none());

        // exact pair must match the permission too
        let miss = index.get_accounts_by_authorizers(&GetAccountsByAuthorizersParams {
            accounts: vec![QueryPermissionLevel {
                actor: name("alice"),
                permission: Some("owner".to_string()),
            }],
            keys: Vec::new(),
        });
        assert!(miss.accounts.is_empty());
    }

    #[test]
    fn test_rollback_restores_previous_state() {
        let k1 = KeyPair::generate().public_key();
        let k2 = KeyPair::generate().public_key();

        let mut index = AuthorityIndex::new();
        index.commit_block(
            1,
            &[PermissionOp::Set {
                account: name("alice"),
                permission: "active".to_string(),
                authority: key_authority(1, &[(k1.clone(), 1)]),
            }],
        );

        let params = GetAccountsByAuthorizersParams {
            accounts: Vec::new(),
            keys: vec![k1.clone(), k2.clone()],
        };
        let before = index.get_accounts_by_authorizers(&params);

        // Block 2 rotates alice's key, then a fork reverts it
        index.commit_block(
            2,
            &[PermissionOp::Set {
                account: name("alice"),
                permission: "active".to_string(),
                authority: key_authority(1, &[(k2.clone(), 1)]),
            }],
        );
        assert_ne!(index.get_accounts_by_authorizers(&params), before);

        index.rollback_to(1);
        assert_eq!(index.get_accounts_by_authorizers(&params), before);
    }

    #[test]
    fn test_rollback_restores_removed_permission() {
        let k1 = KeyPair::generate().public_key();
        let mut index = AuthorityIndex::new();
        index.commit_block(
            1,
            &[PermissionOp::Set {
                account: name("alice"),
                permission: "active".to_string(),
                authority: key_authority(1, &[(k1.clone(), 1)]),
            }],
        );
        index.commit_block(
            2,
            &[PermissionOp::Remove {
                account: name("alice"),
                permission: "active".to_string(),
            }],
        );

        let params = GetAccountsByAuthorizersParams {
            accounts: Vec::new(),
            keys: vec![k1],
        };
        assert!(index.get_accounts_by_authorizers(&params).accounts.is_empty());

        index.rollback_to(1);
        assert_eq!(index.get_accounts_by_authorizers(&params).accounts.len(), 1);
    }

    #[test]
    fn test_prune_keeps_state_but_drops_undo() {
        let k1 = KeyPair::generate().public_key();
        let mut index = AuthorityIndex::new();
        index.commit_block(
            1,
            &[PermissionOp::Set {
                account: name("alice"),
                permission: "active".to_string(),
                authority: key_authority(1, &[(k1.clone(), 1)]),
            }],
        );
        index.prune_irreversible(1);

        // State survives pruning; only the ability to roll back is gone
        let params = GetAccountsByAuthorizersParams {
            accounts: Vec::new(),
            keys: vec![k1],
        };
        assert_eq!(index.get_accounts_by_authorizers(&params).accounts.len(), 1);

        index.rollback_to(0);
        assert_eq!(index.get_accounts_by_authorizers(&params).accounts.len(), 1);
    }
}

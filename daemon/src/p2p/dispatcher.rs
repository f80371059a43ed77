use crate::config::{DISPATCHER_BLOCK_WINDOW, DISPATCHER_TX_GRACE_BLOCKS};
use arcadia_common::{
    block::{BlockNum, SignedBlock},
    crypto::Hash,
    transaction::PackedTransaction,
};
use indexmap::IndexMap;
use log::{debug, trace};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use tokio::sync::RwLock;

// Global registry of recently seen transactions and blocks.
// One owner task performs all mutations (the packet handlers run on it);
// other components only take read snapshots. Every payload entering the
// node passes through here exactly once, which is what keeps the gossip
// engine from reprocessing or re-relaying the same id.
pub struct Dispatcher {
    // txn id -> payload + block that made it expire-eligible
    recent_txns: RwLock<IndexMap<Hash, TxEntry>>,
    // block id -> payload; number is embedded in the id
    recent_blocks: RwLock<IndexMap<Hash, Arc<SignedBlock>>>,
    lib: AtomicU32,
}

struct TxEntry {
    tx: Arc<PackedTransaction>,
    // set when a block includes the transaction; pruned once that block
    // is irreversible plus a grace window
    included_in: Option<BlockNum>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            recent_txns: RwLock::new(IndexMap::new()),
            recent_blocks: RwLock::new(IndexMap::new()),
            lib: AtomicU32::new(0),
        }
    }

    pub fn lib(&self) -> BlockNum {
        self.lib.load(Ordering::SeqCst)
    }

    // Register a newly admitted transaction.
    // Returns None when the id was already known: the caller must not
    // relay it again.
    pub async fn on_accepted_transaction(
        &self,
        tx: PackedTransaction,
    ) -> Option<Arc<PackedTransaction>> {
        let id = tx.id();
        let mut txns = self.recent_txns.write().await;
        if txns.contains_key(&id) {
            if log::log_enabled!(log::Level::Trace) {
                trace!("transaction {} already registered", id);
            }
            return None;
        }
        let tx = Arc::new(tx);
        txns.insert(
            id,
            TxEntry {
                tx: tx.clone(),
                included_in: None,
            },
        );
        Some(tx)
    }

    // Register a newly accepted block and mark its transactions as
    // included. Returns None when the id was already known.
    pub async fn on_accepted_block(&self, block: SignedBlock) -> Option<Arc<SignedBlock>> {
        let id = block.id();
        let mut blocks = self.recent_blocks.write().await;
        if blocks.contains_key(&id) {
            if log::log_enabled!(log::Level::Trace) {
                trace!("block {} already registered", id);
            }
            return None;
        }

        let num = block.num();
        {
            let mut txns = self.recent_txns.write().await;
            for tx in &block.transactions {
                let tx_id = tx.id();
                match txns.get_mut(&tx_id) {
                    Some(entry) => entry.included_in = Some(num),
                    None => {
                        txns.insert(
                            tx_id,
                            TxEntry {
                                tx: Arc::new(tx.clone()),
                                included_in: Some(num),
                            },
                        );
                    }
                }
            }
        }

        let block = Arc::new(block);
        blocks.insert(id, block.clone());
        Some(block)
    }

    // Advance the irreversible mark and prune entries that fell out of
    // the retention windows. Fork blocks above the LIB stay until the
    // fork is adopted or abandoned.
    pub async fn on_irreversible_block(&self, lib: BlockNum) {
        self.lib.store(lib, Ordering::SeqCst);

        let mut txns = self.recent_txns.write().await;
        let before = txns.len();
        txns.retain(|_, entry| match entry.included_in {
            Some(num) => num.saturating_add(DISPATCHER_TX_GRACE_BLOCKS) > lib,
            None => true,
        });
        let pruned_txns = before - txns.len();
        drop(txns);

        let mut blocks = self.recent_blocks.write().await;
        let before = blocks.len();
        let cutoff = lib.saturating_sub(DISPATCHER_BLOCK_WINDOW);
        blocks.retain(|_, block| block.num() >= cutoff);
        let pruned_blocks = before - blocks.len();

        if (pruned_txns > 0 || pruned_blocks > 0) && log::log_enabled!(log::Level::Debug) {
            debug!(
                "pruned {} transactions and {} blocks at lib {}",
                pruned_txns, pruned_blocks, lib
            );
        }
    }

    pub async fn lookup_txn(&self, id: &Hash) -> Option<Arc<PackedTransaction>> {
        self.recent_txns
            .read()
            .await
            .get(id)
            .map(|entry| entry.tx.clone())
    }

    pub async fn lookup_block(&self, id: &Hash) -> Option<Arc<SignedBlock>> {
        self.recent_blocks.read().await.get(id).cloned()
    }

    pub async fn has_txn(&self, id: &Hash) -> bool {
        self.recent_txns.read().await.contains_key(id)
    }

    pub async fn has_block(&self, id: &Hash) -> bool {
        self.recent_blocks.read().await.contains_key(id)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

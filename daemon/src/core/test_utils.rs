// In-memory chain controller used by the p2p tests: a strictly linear
// chain that accepts blocks only in order.

use crate::core::{BlockError, ChainController, TransactionError};
use arcadia_common::{
    block::{BlockHeader, BlockNum, SignedBlock},
    crypto::{Hash, KeyPair, Signature},
    time::{get_current_time_in_millis, TimestampMillis},
    transaction::PackedTransaction,
};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

pub struct TestChain {
    chain_id: Hash,
    producer: KeyPair,
    state: Mutex<ChainState>,
    accepted_txs: AtomicUsize,
}

struct ChainState {
    blocks: Vec<SignedBlock>,
    head_time: TimestampMillis,
    lib: BlockNum,
}

impl TestChain {
    // head_time starts at zero so a fresh chain always looks stale to the
    // sync trigger
    pub fn new(chain_id: Hash) -> Self {
        Self {
            chain_id,
            producer: KeyPair::generate(),
            state: Mutex::new(ChainState {
                blocks: Vec::new(),
                head_time: 0,
                lib: 0,
            }),
            accepted_txs: AtomicUsize::new(0),
        }
    }

    // Append n locally produced blocks
    pub fn produce_blocks(&self, n: u32) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..n {
            let number = state.blocks.len() as BlockNum + 1;
            let previous = state
                .blocks
                .last()
                .map(|block| block.id())
                .unwrap_or_else(Hash::zero);
            let block = SignedBlock {
                header: BlockHeader {
                    previous,
                    number,
                    timestamp: number as u64,
                    producer: self.producer.public_key(),
                    transactions_root: Hash::zero(),
                },
                producer_signature: Signature::zero(),
                transactions: Vec::new(),
            };
            state.blocks.push(block);
        }
        state.lib = state.blocks.len() as BlockNum;
    }

    pub fn accepted_tx_count(&self) -> usize {
        self.accepted_txs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainController for TestChain {
    fn chain_id(&self) -> Hash {
        self.chain_id.clone()
    }

    fn head_num(&self) -> BlockNum {
        self.state.lock().unwrap().blocks.len() as BlockNum
    }

    fn head_id(&self) -> Hash {
        self.state
            .lock()
            .unwrap()
            .blocks
            .last()
            .map(|block| block.id())
            .unwrap_or_else(Hash::zero)
    }

    fn head_block_time(&self) -> TimestampMillis {
        self.state.lock().unwrap().head_time
    }

    fn lib_num(&self) -> BlockNum {
        self.state.lock().unwrap().lib
    }

    fn lib_id(&self) -> Hash {
        let state = self.state.lock().unwrap();
        if state.lib == 0 {
            return Hash::zero();
        }
        state.blocks[state.lib as usize - 1].id()
    }

    async fn accept_block(&self, block: SignedBlock) -> Result<(), BlockError> {
        let mut state = self.state.lock().unwrap();
        let head_id = state
            .blocks
            .last()
            .map(|b| b.id())
            .unwrap_or_else(Hash::zero);
        let next = state.blocks.len() as BlockNum + 1;
        if block.num() != next || block.header.previous != head_id {
            return Err(BlockError::Unlinkable);
        }
        state.blocks.push(block);
        state.lib = state.blocks.len() as BlockNum;
        state.head_time = get_current_time_in_millis();
        Ok(())
    }

    async fn accept_transaction(&self, _tx: PackedTransaction) -> Result<(), TransactionError> {
        self.accepted_txs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn block_by_num(&self, num: BlockNum) -> Option<SignedBlock> {
        if num == 0 {
            return None;
        }
        self.state
            .lock()
            .unwrap()
            .blocks
            .get(num as usize - 1)
            .cloned()
    }

    async fn block_by_id(&self, id: &Hash) -> Option<SignedBlock> {
        self.state
            .lock()
            .unwrap()
            .blocks
            .iter()
            .find(|block| block.id() == *id)
            .cloned()
    }
}

pub mod authority;
mod error;

pub use error::{BlockError, BlockchainError, TransactionError};

use arcadia_common::{
    block::{BlockNum, SignedBlock},
    crypto::Hash,
    time::TimestampMillis,
    transaction::PackedTransaction,
};
use async_trait::async_trait;

// The consensus/validation engine, owned by the host application.
// The network layer feeds it payloads and reads chain position through it;
// it never inspects validation internals.
#[async_trait]
pub trait ChainController: Send + Sync + 'static {
    fn chain_id(&self) -> Hash;

    fn head_num(&self) -> BlockNum;
    fn head_id(&self) -> Hash;
    fn head_block_time(&self) -> TimestampMillis;

    fn lib_num(&self) -> BlockNum;
    fn lib_id(&self) -> Hash;

    // Apply a block received from the network.
    // The distinction between unlinkable and invalid drives the go-away
    // reason sent back to the peer.
    async fn accept_block(&self, block: SignedBlock) -> Result<(), BlockError>;

    // Admit a transaction to the mempool
    async fn accept_transaction(&self, tx: PackedTransaction) -> Result<(), TransactionError>;

    async fn block_by_num(&self, num: BlockNum) -> Option<SignedBlock>;
    async fn block_by_id(&self, id: &Hash) -> Option<SignedBlock>;
}

#[cfg(test)]
pub mod test_utils;

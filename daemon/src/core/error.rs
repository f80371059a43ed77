use thiserror::Error;

// Outcome of handing a block to the chain controller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    // The block does not link to any known block
    #[error("unlinkable block")]
    Unlinkable,
    #[error("invalid block: {0}")]
    Validation(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction failed verification: {0}")]
    Invalid(String),
    #[error("duplicate transaction")]
    Duplicate,
    #[error("transaction expired")]
    Expired,
}

// Irrecoverable chain-side failures, propagated to the host application
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("block rejected: {0}")]
    Block(#[from] BlockError),
    #[error("transaction rejected: {0}")]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

use std::io;

use thiserror::Error;

use crate::abi::AbiError;
use crate::provider::ProviderError;
use crate::types::{Address, ChainId, TxHash};
use crate::units::UnitsError;

#[derive(Debug, Error)]
pub enum DappError {
    #[error("no wallet provider available; install a wallet or configure an RPC endpoint")]
    NoProvider,
    #[error("network mismatch: expected chain {expected}, active chain {actual:?}")]
    NetworkMismatch {
        expected: ChainId,
        actual: Option<ChainId>,
    },
    #[error("contract not found at {address} on the active network; check the address and network")]
    ContractNotFound { address: Address },
    #[error("wallet not connected")]
    NotConnected,
    #[error("wallet returned no accounts")]
    NoAccounts,
    #[error("account has already voted")]
    AlreadyVoted,
    #[error("proposal index {index} out of range ({count} proposals)")]
    ProposalOutOfRange { index: usize, count: usize },
    #[error("voter record not loaded")]
    VoterRecordUnavailable,
    #[error("payments in {symbol} are not supported")]
    UnsupportedToken { symbol: String },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("transaction rejected: {reason}")]
    TransactionRejected { reason: String },
    #[error("transaction {hash} reverted: {reason}")]
    TransactionReverted { hash: TxHash, reason: String },
    #[error("provider error: {0}")]
    Provider(ProviderError),
    #[error("abi error: {0}")]
    Abi(#[from] AbiError),
    #[error("units error: {0}")]
    Units(#[from] UnitsError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<ProviderError> for DappError {
    fn from(error: ProviderError) -> Self {
        Self::Provider(error)
    }
}

pub type DappResult<T> = Result<T, DappError>;

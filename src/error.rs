//! Top-level error type.

use thiserror::Error;

use crate::chain::ChainError;
use crate::challenge::ChallengeError;
use crate::config::ConfigError;
use crate::crypto::CryptoError;
use crate::feed::FeedError;
use crate::ledger::LedgerError;
use crate::notify::NotifyError;
use crate::oracle::OracleError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

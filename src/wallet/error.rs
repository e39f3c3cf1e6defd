//! Error types for wallet operations.

use thiserror::Error;

use crate::Amount;
use crate::model::EntryId;
use crate::store::StoreError;

/// Failure of the balance-mutation primitive.
///
/// Either way the wallet balance is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    #[error("could not create ledger entry: {0}")]
    EntryCreation(StoreError),

    #[error("could not persist balance for entry {entry}: {source}")]
    Persistence { entry: EntryId, source: StoreError },
}

/// Top-level error returned by [`WalletLedger`](super::WalletLedger).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("wallet {0} not found")]
    NotFound(String),

    #[error("wallet {0} already exists")]
    AlreadyExists(String),

    #[error("insufficient funds for wallet {0}: balance {1}, requested {2}")]
    InsufficientFunds(String, Amount, Amount),

    #[error("invalid amount {0}")]
    InvalidAmount(Amount),

    #[error("balance mutation failed: {0}")]
    Balance(#[from] BalanceError),

    #[error("{0}")]
    Store(#[from] StoreError),
}

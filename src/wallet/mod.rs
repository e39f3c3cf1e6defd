//! Wallets and their ledger.
//!
//! Every balance change goes through [`WalletLedger::mutate_balance`]: a
//! pending entry is created first, then the balance write and the entry
//! attachment are committed as one store operation, and only then is the
//! entry marked completed.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::Amount;
use crate::model::{Direction, EntryId, EntryStatus, LedgerEntry, Wallet};
use crate::store::{LedgerStore, Stores, WalletStore};

mod error;
pub use error::{BalanceError, WalletError};

/// Attempts made to mark a committed entry completed.
const STATUS_ATTEMPTS: usize = 3;

/// Result of a committed balance mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub entry: LedgerEntry,
    pub balance: Amount,
}

#[derive(Clone)]
pub struct WalletLedger {
    wallets: Arc<dyn WalletStore>,
    ledger: Arc<dyn LedgerStore>,
}

/// Public API
impl WalletLedger {
    pub fn new(stores: &Stores) -> Self {
        Self {
            wallets: stores.wallets.clone(),
            ledger: stores.ledger.clone(),
        }
    }

    /// Create an empty wallet; fails if the phone number already has one.
    pub async fn register(&self, phone: &str) -> Result<Wallet, WalletError> {
        match self.wallets.create_wallet(Wallet::new(phone)).await {
            Ok(wallet) => {
                info!(phone, wallet = %wallet.id, "wallet registered");
                Ok(wallet)
            }
            Err(e) if e.is_conflict() => Err(WalletError::AlreadyExists(phone.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find(&self, phone: &str) -> Result<Wallet, WalletError> {
        self.wallets.get_by_phone(phone).await.map_err(|e| {
            if e.is_not_found() {
                WalletError::NotFound(phone.to_string())
            } else {
                e.into()
            }
        })
    }

    /// Fetch the wallet for a phone number, creating an empty one if needed.
    pub async fn get_or_create(&self, phone: &str) -> Result<Wallet, WalletError> {
        match self.wallets.get_by_phone(phone).await {
            Ok(wallet) => Ok(wallet),
            Err(e) if e.is_not_found() => match self.wallets.create_wallet(Wallet::new(phone)).await
            {
                Ok(wallet) => {
                    info!(phone, wallet = %wallet.id, "wallet created");
                    Ok(wallet)
                }
                // Someone registered the phone in between
                Err(e) if e.is_conflict() => Ok(self.wallets.get_by_phone(phone).await?),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// All ledger entries of a wallet, in creation order.
    pub async fn entries(&self, phone: &str) -> Result<Vec<LedgerEntry>, WalletError> {
        let wallet = self.find(phone).await?;
        Ok(self.ledger.list_by_wallet(wallet.id).await?)
    }

    /// Administrative removal of a wallet and its entries.
    pub async fn delete(&self, phone: &str) -> Result<Wallet, WalletError> {
        let wallet = self.wallets.delete_wallet(phone).await.map_err(|e| {
            if e.is_not_found() {
                WalletError::NotFound(phone.to_string())
            } else {
                WalletError::from(e)
            }
        })?;
        info!(phone, wallet = %wallet.id, "wallet deleted");
        Ok(wallet)
    }

    pub async fn list(&self) -> Result<Vec<Wallet>, WalletError> {
        Ok(self.wallets.list_wallets().await?)
    }

    /// Direct deposit or withdrawal on an existing wallet.
    ///
    /// Withdrawals are checked against the balance read here, which is not
    /// serialized with other callers.
    pub async fn transact(
        &self,
        phone: &str,
        direction: Direction,
        amount: Amount,
        description: &str,
    ) -> Result<Mutation, WalletError> {
        if amount.is_negative() {
            return Err(WalletError::InvalidAmount(amount));
        }

        let wallet = self.find(phone).await?;

        if direction == Direction::Withdrawal && amount > wallet.balance {
            warn!(
                phone,
                balance = %wallet.balance,
                requested = %amount,
                "insufficient funds"
            );
            return Err(WalletError::InsufficientFunds(
                phone.to_string(),
                wallet.balance,
                amount,
            ));
        }

        Ok(self
            .mutate_balance(&wallet, direction, amount, description)
            .await?)
    }

    /// Record a ledger entry and apply it to the wallet balance.
    ///
    /// On success the entry is `Completed` and the returned balance is the
    /// committed one. On failure the balance is untouched and the entry, if
    /// it was created, is marked `Failed`.
    pub async fn mutate_balance(
        &self,
        wallet: &Wallet,
        direction: Direction,
        amount: Amount,
        description: &str,
    ) -> Result<Mutation, BalanceError> {
        let pending = LedgerEntry::pending(wallet.id, direction, amount, description);
        let mut entry = self
            .ledger
            .create_entry(pending)
            .await
            .map_err(BalanceError::EntryCreation)?;

        let balance = match self
            .wallets
            .adjust_balance(wallet.id, entry.id, entry.delta())
            .await
        {
            Ok(balance) => balance,
            Err(source) => {
                error!(
                    wallet = %wallet.id,
                    entry = %entry.id,
                    reason = %source,
                    "balance write failed"
                );
                if let Err(e) = self.ledger.set_status(entry.id, EntryStatus::Failed).await {
                    error!(entry = %entry.id, reason = %e, "could not mark entry failed");
                }
                return Err(BalanceError::Persistence {
                    entry: entry.id,
                    source,
                });
            }
        };

        // Money has moved; from here on failures are only reported
        self.complete(entry.id).await;
        entry.status = EntryStatus::Completed;

        info!(
            wallet = %wallet.id,
            entry = %entry.id,
            direction = %direction,
            amount = %amount,
            balance = %balance,
            "ledger entry committed"
        );

        Ok(Mutation { entry, balance })
    }
}

/// Private API
impl WalletLedger {
    async fn complete(&self, entry: EntryId) {
        for attempt in 1..=STATUS_ATTEMPTS {
            match self.ledger.set_status(entry, EntryStatus::Completed).await {
                Ok(()) => return,
                Err(e) => warn!(
                    entry = %entry,
                    attempt,
                    reason = %e,
                    "could not mark committed entry completed"
                ),
            }
        }
        error!(entry = %entry, "committed entry left pending");
    }
}

//! Data-access contracts used by the ledger core.
//!
//! Each trait is the narrow slice of persistence one component needs. The
//! only cross-record atomicity the core relies on is
//! [`WalletStore::adjust_balance`], which must write the new balance and
//! attach the ledger entry as a single unit.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::Amount;
use crate::model::{
    Discount, DiscountId, EntryId, EntryStatus, LedgerEntry, Redemption, RedemptionId, Wallet,
    WalletId,
};

mod memory;
pub use memory::MemoryStore;

/// Error returned by every store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} {key} already exists")]
    Conflict { entity: &'static str, key: String },

    #[error("entry {0} cannot move from {1:?} to {2:?}")]
    InvalidTransition(EntryId, EntryStatus, EntryStatus),

    #[error("balance of wallet {0} would overflow")]
    Overflow(WalletId),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, key: impl ToString) -> Self {
        StoreError::Conflict {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn get_by_phone(&self, phone: &str) -> Result<Wallet, StoreError>;

    async fn get_by_id(&self, id: WalletId) -> Result<Wallet, StoreError>;

    /// Insert a wallet; `Conflict` when the phone number is taken.
    async fn create_wallet(&self, wallet: Wallet) -> Result<Wallet, StoreError>;

    /// Atomically add `delta` to the balance and attach `entry` to the
    /// wallet. Returns the new balance. On error nothing is written.
    async fn adjust_balance(
        &self,
        wallet: WalletId,
        entry: EntryId,
        delta: Amount,
    ) -> Result<Amount, StoreError>;

    /// Remove a wallet and its ledger entries.
    async fn delete_wallet(&self, phone: &str) -> Result<Wallet, StoreError>;

    async fn list_wallets(&self) -> Result<Vec<Wallet>, StoreError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_entry(&self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError>;

    /// Move a pending entry to a terminal status.
    async fn set_status(&self, id: EntryId, status: EntryStatus) -> Result<(), StoreError>;

    async fn get_entry(&self, id: EntryId) -> Result<LedgerEntry, StoreError>;

    async fn list_by_wallet(&self, wallet: WalletId) -> Result<Vec<LedgerEntry>, StoreError>;
}

#[async_trait]
pub trait DiscountStore: Send + Sync {
    /// Insert a discount; `Conflict` when the code is taken.
    async fn create_discount(&self, discount: Discount) -> Result<Discount, StoreError>;

    async fn get_by_code(&self, code: &str) -> Result<Discount, StoreError>;

    async fn count_redemptions(&self, discount: DiscountId) -> Result<u64, StoreError>;

    async fn has_redeemed(&self, discount: DiscountId, phone: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait RedemptionStore: Send + Sync {
    /// Insert a marker; `Conflict` when (discount, phone) already has one.
    async fn insert_redemption(
        &self,
        discount: DiscountId,
        wallet: WalletId,
        phone: &str,
    ) -> Result<Redemption, StoreError>;

    async fn delete_redemption(&self, id: RedemptionId) -> Result<(), StoreError>;

    async fn list_redemptions(&self, discount: DiscountId) -> Result<Vec<Redemption>, StoreError>;
}

/// Handles to every store the core talks to.
#[derive(Clone)]
pub struct Stores {
    pub wallets: Arc<dyn WalletStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub discounts: Arc<dyn DiscountStore>,
    pub redemptions: Arc<dyn RedemptionStore>,
}

impl Stores {
    /// Back every store with one shared [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }

    /// Use one backend implementing all four contracts.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: WalletStore + LedgerStore + DiscountStore + RedemptionStore + 'static,
    {
        Self {
            wallets: backend.clone(),
            ledger: backend.clone(),
            discounts: backend.clone(),
            redemptions: backend,
        }
    }
}

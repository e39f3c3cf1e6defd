#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use wallet_ledger::Amount;
use wallet_ledger::model::{
    Discount, DiscountId, EntryId, EntryStatus, LedgerEntry, Redemption, RedemptionId, Wallet,
    WalletId,
};
use wallet_ledger::store::{
    DiscountStore, LedgerStore, MemoryStore, RedemptionStore, StoreError, Stores, WalletStore,
};

/// [`MemoryStore`] wrapper with switchable failures and latency.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_balance: AtomicBool,
    fail_redemption_delete: AtomicBool,
    balance_delay_ms: AtomicU64,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores::from_backend(self.clone())
    }

    pub fn fail_balance(&self, fail: bool) {
        self.fail_balance.store(fail, Ordering::SeqCst);
    }

    pub fn fail_redemption_delete(&self, fail: bool) {
        self.fail_redemption_delete.store(fail, Ordering::SeqCst);
    }

    pub fn delay_balance(&self, delay: Duration) {
        self.balance_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

fn injected(what: &str) -> StoreError {
    StoreError::Backend(format!("injected {what} failure"))
}

#[async_trait]
impl WalletStore for FlakyStore {
    async fn get_by_phone(&self, phone: &str) -> Result<Wallet, StoreError> {
        self.inner.get_by_phone(phone).await
    }

    async fn get_by_id(&self, id: WalletId) -> Result<Wallet, StoreError> {
        self.inner.get_by_id(id).await
    }

    async fn create_wallet(&self, wallet: Wallet) -> Result<Wallet, StoreError> {
        self.inner.create_wallet(wallet).await
    }

    async fn adjust_balance(
        &self,
        wallet: WalletId,
        entry: EntryId,
        delta: Amount,
    ) -> Result<Amount, StoreError> {
        let delay = self.balance_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(injected("balance"));
        }
        self.inner.adjust_balance(wallet, entry, delta).await
    }

    async fn delete_wallet(&self, phone: &str) -> Result<Wallet, StoreError> {
        self.inner.delete_wallet(phone).await
    }

    async fn list_wallets(&self) -> Result<Vec<Wallet>, StoreError> {
        self.inner.list_wallets().await
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn create_entry(&self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError> {
        self.inner.create_entry(entry).await
    }

    async fn set_status(&self, id: EntryId, status: EntryStatus) -> Result<(), StoreError> {
        self.inner.set_status(id, status).await
    }

    async fn get_entry(&self, id: EntryId) -> Result<LedgerEntry, StoreError> {
        self.inner.get_entry(id).await
    }

    async fn list_by_wallet(&self, wallet: WalletId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.list_by_wallet(wallet).await
    }
}

#[async_trait]
impl DiscountStore for FlakyStore {
    async fn create_discount(&self, discount: Discount) -> Result<Discount, StoreError> {
        self.inner.create_discount(discount).await
    }

    async fn get_by_code(&self, code: &str) -> Result<Discount, StoreError> {
        self.inner.get_by_code(code).await
    }

    async fn count_redemptions(&self, discount: DiscountId) -> Result<u64, StoreError> {
        self.inner.count_redemptions(discount).await
    }

    async fn has_redeemed(&self, discount: DiscountId, phone: &str) -> Result<bool, StoreError> {
        self.inner.has_redeemed(discount, phone).await
    }
}

#[async_trait]
impl RedemptionStore for FlakyStore {
    async fn insert_redemption(
        &self,
        discount: DiscountId,
        wallet: WalletId,
        phone: &str,
    ) -> Result<Redemption, StoreError> {
        self.inner.insert_redemption(discount, wallet, phone).await
    }

    async fn delete_redemption(&self, id: RedemptionId) -> Result<(), StoreError> {
        if self.fail_redemption_delete.load(Ordering::SeqCst) {
            return Err(injected("redemption delete"));
        }
        self.inner.delete_redemption(id).await
    }

    async fn list_redemptions(&self, discount: DiscountId) -> Result<Vec<Redemption>, StoreError> {
        self.inner.list_redemptions(discount).await
    }
}

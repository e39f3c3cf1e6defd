use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{DiscountStore, LedgerStore, RedemptionStore, StoreError, WalletStore};
use crate::Amount;
use crate::model::{
    Discount, DiscountId, EntryId, EntryStatus, LedgerEntry, Redemption, RedemptionId, Wallet,
    WalletId,
};

#[derive(Debug, Default)]
struct State {
    wallets: HashMap<WalletId, Wallet>,
    phones: HashMap<String, WalletId>,
    entries: HashMap<EntryId, LedgerEntry>,
    /// Every entry created for a wallet, in creation order
    wallet_entries: HashMap<WalletId, Vec<EntryId>>,
    discounts: HashMap<DiscountId, Discount>,
    codes: HashMap<String, DiscountId>,
    redemptions: HashMap<RedemptionId, Redemption>,
    redeemed: HashSet<(DiscountId, String)>,
}

/// Process-local store implementing every data-access contract.
///
/// All records live behind one mutex, so each trait method is atomic with
/// respect to every other one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn get_by_phone(&self, phone: &str) -> Result<Wallet, StoreError> {
        let state = self.state()?;
        state
            .phones
            .get(phone)
            .and_then(|id| state.wallets.get(id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("wallet", phone))
    }

    async fn get_by_id(&self, id: WalletId) -> Result<Wallet, StoreError> {
        self.state()?
            .wallets
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("wallet", id))
    }

    async fn create_wallet(&self, wallet: Wallet) -> Result<Wallet, StoreError> {
        let mut state = self.state()?;
        if state.phones.contains_key(&wallet.phone) {
            return Err(StoreError::conflict("wallet", &wallet.phone));
        }
        state.phones.insert(wallet.phone.clone(), wallet.id);
        state.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    async fn adjust_balance(
        &self,
        wallet: WalletId,
        entry: EntryId,
        delta: Amount,
    ) -> Result<Amount, StoreError> {
        let mut state = self.state()?;

        // Validate everything before touching anything
        let record = state
            .entries
            .get(&entry)
            .ok_or_else(|| StoreError::not_found("entry", entry))?;
        if record.wallet_id != wallet {
            return Err(StoreError::not_found("entry", entry));
        }
        if record.status != EntryStatus::Pending {
            return Err(StoreError::InvalidTransition(
                entry,
                record.status,
                EntryStatus::Completed,
            ));
        }

        let account = state
            .wallets
            .get_mut(&wallet)
            .ok_or_else(|| StoreError::not_found("wallet", wallet))?;
        if account.entries.contains(&entry) {
            return Err(StoreError::conflict("entry", entry));
        }
        let balance = account
            .balance
            .checked_add(delta)
            .ok_or(StoreError::Overflow(wallet))?;

        account.balance = balance;
        account.entries.push(entry);
        Ok(balance)
    }

    async fn delete_wallet(&self, phone: &str) -> Result<Wallet, StoreError> {
        let mut state = self.state()?;
        let id = state
            .phones
            .remove(phone)
            .ok_or_else(|| StoreError::not_found("wallet", phone))?;
        let wallet = state
            .wallets
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("wallet", id))?;
        for entry in state.wallet_entries.remove(&id).unwrap_or_default() {
            state.entries.remove(&entry);
        }
        Ok(wallet)
    }

    async fn list_wallets(&self) -> Result<Vec<Wallet>, StoreError> {
        let mut wallets: Vec<_> = self.state()?.wallets.values().cloned().collect();
        wallets.sort_by(|a, b| a.phone.cmp(&b.phone));
        Ok(wallets)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn create_entry(&self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError> {
        let mut state = self.state()?;
        if !state.wallets.contains_key(&entry.wallet_id) {
            return Err(StoreError::not_found("wallet", entry.wallet_id));
        }
        if state.entries.contains_key(&entry.id) {
            return Err(StoreError::conflict("entry", entry.id));
        }
        state
            .wallet_entries
            .entry(entry.wallet_id)
            .or_default()
            .push(entry.id);
        state.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn set_status(&self, id: EntryId, status: EntryStatus) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("entry", id))?;
        if entry.status == status {
            return Ok(());
        }
        if entry.status.is_terminal() {
            return Err(StoreError::InvalidTransition(id, entry.status, status));
        }
        entry.status = status;
        Ok(())
    }

    async fn get_entry(&self, id: EntryId) -> Result<LedgerEntry, StoreError> {
        self.state()?
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("entry", id))
    }

    async fn list_by_wallet(&self, wallet: WalletId) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state()?;
        let ids = state.wallet_entries.get(&wallet).map(Vec::as_slice).unwrap_or(&[]);
        Ok(ids
            .iter()
            .filter_map(|id| state.entries.get(id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DiscountStore for MemoryStore {
    async fn create_discount(&self, discount: Discount) -> Result<Discount, StoreError> {
        let mut state = self.state()?;
        if state.codes.contains_key(&discount.code) {
            return Err(StoreError::conflict("discount", &discount.code));
        }
        state.codes.insert(discount.code.clone(), discount.id);
        state.discounts.insert(discount.id, discount.clone());
        Ok(discount)
    }

    async fn get_by_code(&self, code: &str) -> Result<Discount, StoreError> {
        let state = self.state()?;
        state
            .codes
            .get(code)
            .and_then(|id| state.discounts.get(id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("discount", code))
    }

    async fn count_redemptions(&self, discount: DiscountId) -> Result<u64, StoreError> {
        let state = self.state()?;
        let count = state
            .redemptions
            .values()
            .filter(|r| r.discount_id == discount)
            .count();
        Ok(count as u64)
    }

    async fn has_redeemed(&self, discount: DiscountId, phone: &str) -> Result<bool, StoreError> {
        Ok(self
            .state()?
            .redeemed
            .contains(&(discount, phone.to_string())))
    }
}

#[async_trait]
impl RedemptionStore for MemoryStore {
    async fn insert_redemption(
        &self,
        discount: DiscountId,
        wallet: WalletId,
        phone: &str,
    ) -> Result<Redemption, StoreError> {
        let mut state = self.state()?;
        if !state.discounts.contains_key(&discount) {
            return Err(StoreError::not_found("discount", discount));
        }
        let key = (discount, phone.to_string());
        if state.redeemed.contains(&key) {
            return Err(StoreError::conflict("redemption", format!("{discount}/{phone}")));
        }
        let redemption = Redemption {
            id: Uuid::new_v4(),
            discount_id: discount,
            wallet_id: wallet,
            phone: phone.to_string(),
            created_at: Utc::now(),
        };
        state.redeemed.insert(key);
        state.redemptions.insert(redemption.id, redemption.clone());
        Ok(redemption)
    }

    async fn delete_redemption(&self, id: RedemptionId) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let redemption = state
            .redemptions
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("redemption", id))?;
        state
            .redeemed
            .remove(&(redemption.discount_id, redemption.phone));
        Ok(())
    }

    async fn list_redemptions(&self, discount: DiscountId) -> Result<Vec<Redemption>, StoreError> {
        let mut redemptions: Vec<_> = self
            .state()?
            .redemptions
            .values()
            .filter(|r| r.discount_id == discount)
            .cloned()
            .collect();
        redemptions.sort_by_key(|r| r.created_at);
        Ok(redemptions)
    }
}

//! Core domain types for the wallet ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Amount;

/// Wallet identifier.
pub type WalletId = Uuid;

/// Ledger entry identifier.
pub type EntryId = Uuid;

/// Discount identifier.
pub type DiscountId = Uuid;

/// Redemption marker identifier.
pub type RedemptionId = Uuid;

/// A balance keyed by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub phone: String,
    pub balance: Amount,
    /// Committed ledger entries, in commit order.
    pub entries: Vec<EntryId>,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty wallet for a phone number.
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            phone: phone.into(),
            balance: Amount::ZERO,
            entries: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Deposit,
    Withdrawal,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Deposit => "deposit",
            Direction::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl EntryStatus {
    /// `Completed` and `Failed` are final.
    pub fn is_terminal(self) -> bool {
        !matches!(self, EntryStatus::Pending)
    }
}

/// One deposit or withdrawal recorded against a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub wallet_id: WalletId,
    pub direction: Direction,
    pub amount: Amount,
    pub description: String,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a new entry in the `Pending` state.
    pub fn pending(
        wallet_id: WalletId,
        direction: Direction,
        amount: Amount,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            direction,
            amount,
            description: description.into(),
            status: EntryStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Balance delta of this entry: positive for deposits, negative for withdrawals.
    pub fn delta(&self) -> Amount {
        match self.direction {
            Direction::Deposit => self.amount,
            Direction::Withdrawal => -self.amount,
        }
    }
}

/// Kind of a discount code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    #[default]
    Voucher,
    Charge,
}

impl DiscountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountKind::Voucher => "voucher",
            DiscountKind::Charge => "charge",
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "voucher" => Ok(DiscountKind::Voucher),
            "charge" => Ok(DiscountKind::Charge),
            other => Err(format!("unknown discount kind '{other}'")),
        }
    }
}

/// A redeemable code granting a fixed deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub id: DiscountId,
    pub code: String,
    pub description: String,
    pub amount: Amount,
    /// Total redemptions allowed across all phone numbers.
    pub usage_limit: u64,
    pub expires_at: DateTime<Utc>,
    pub kind: DiscountKind,
    pub created_at: DateTime<Utc>,
}

impl Discount {
    /// Redemption window is `created_at <= t < expires_at`.
    pub fn is_open_at(&self, t: DateTime<Utc>) -> bool {
        self.created_at <= t && t < self.expires_at
    }

    pub fn summary(&self) -> DiscountSummary {
        DiscountSummary {
            code: self.code.clone(),
            description: self.description.clone(),
            total: self.amount,
            kind: self.kind,
        }
    }
}

/// Request to create a discount. Missing code and expiration are filled in
/// by the discount service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDiscount {
    pub code: Option<String>,
    pub description: String,
    pub amount: Amount,
    pub usage_limit: u64,
    pub expires_at: Option<DateTime<Utc>>,
    pub kind: DiscountKind,
}

/// What a caller reports back after a successful redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountSummary {
    pub code: String,
    pub description: String,
    pub total: Amount,
    pub kind: DiscountKind,
}

/// Marker proving a phone number has used a discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: RedemptionId,
    pub discount_id: DiscountId,
    pub wallet_id: WalletId,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// A command representing the possible inputs of the engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// Create an empty wallet for a phone number.
    Register { phone: String },
    /// Credit a wallet.
    Deposit {
        phone: String,
        amount: Amount,
        description: String,
    },
    /// Debit a wallet; fails when the balance is too low.
    Withdrawal {
        phone: String,
        amount: Amount,
        description: String,
    },
    /// Define a new discount code.
    CreateDiscount(NewDiscount),
    /// Redeem a discount code into the wallet of a phone number.
    Redeem { code: String, phone: String },
    /// Remove a wallet and its entries.
    DeleteWallet { phone: String },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::Deposit { .. } => "deposit",
            Command::Withdrawal { .. } => "withdrawal",
            Command::CreateDiscount(_) => "discount",
            Command::Redeem { .. } => "redeem",
            Command::DeleteWallet { .. } => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn discount(created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Discount {
        Discount {
            id: Uuid::new_v4(),
            code: "CODE1".to_string(),
            description: "welcome".to_string(),
            amount: Amount::from_units(1000),
            usage_limit: 1,
            expires_at,
            kind: DiscountKind::Voucher,
            created_at,
        }
    }

    #[test]
    fn new_wallet_is_empty() {
        let wallet = Wallet::new("+15550001");
        assert_eq!(wallet.balance, Amount::ZERO);
        assert!(wallet.entries.is_empty());
    }

    #[test]
    fn entry_starts_pending() {
        let entry = LedgerEntry::pending(Uuid::new_v4(), Direction::Deposit, Amount::from_units(5), "x");
        assert_eq!(entry.status, EntryStatus::Pending);
        assert!(!entry.status.is_terminal());
    }

    #[test]
    fn terminal_statuses() {
        assert!(EntryStatus::Completed.is_terminal());
        assert!(EntryStatus::Failed.is_terminal());
    }

    #[test]
    fn entry_delta_is_signed() {
        let wallet = Uuid::new_v4();
        let deposit = LedgerEntry::pending(wallet, Direction::Deposit, Amount::from_units(30), "in");
        let withdrawal =
            LedgerEntry::pending(wallet, Direction::Withdrawal, Amount::from_units(30), "out");
        assert_eq!(deposit.delta(), Amount::from_units(30));
        assert_eq!(withdrawal.delta(), Amount::from_units(-30));
    }

    #[test]
    fn window_is_half_open() {
        let now = Utc::now();
        let d = discount(now, now + Duration::hours(1));
        assert!(d.is_open_at(now));
        assert!(d.is_open_at(now + Duration::minutes(59)));
        assert!(!d.is_open_at(now + Duration::hours(1)));
        assert!(!d.is_open_at(now - Duration::seconds(1)));
    }

    #[test]
    fn discount_kind_parses() {
        assert_eq!("voucher".parse::<DiscountKind>(), Ok(DiscountKind::Voucher));
        assert_eq!("charge".parse::<DiscountKind>(), Ok(DiscountKind::Charge));
        assert!("coupon".parse::<DiscountKind>().is_err());
    }

    #[test]
    fn summary_copies_discount_fields() {
        let now = Utc::now();
        let summary = discount(now, now + Duration::hours(1)).summary();
        assert_eq!(summary.code, "CODE1");
        assert_eq!(summary.total, Amount::from_units(1000));
        assert_eq!(summary.kind, DiscountKind::Voucher);
    }
}

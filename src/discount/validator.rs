//! Redeemability checks over already-fetched discount data.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::Discount;

/// Why a discount cannot be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("usage limit exceeded")]
    UsageLimitExceeded,
    #[error("discount code used before")]
    AlreadyRedeemed,
    #[error("discount expired")]
    Expired,
    #[error("discount not yet valid")]
    NotYetValid,
}

/// Redemption state of one discount as seen by one phone number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    /// Redemptions recorded for the discount across all phone numbers.
    pub count: u64,
    /// Whether the phone number already holds a redemption.
    pub redeemed_by_phone: bool,
}

/// Decide whether `discount` may be redeemed at `now`.
pub fn check(discount: &Discount, usage: Usage, now: DateTime<Utc>) -> Result<(), Rejection> {
    if usage.count >= discount.usage_limit {
        return Err(Rejection::UsageLimitExceeded);
    }
    if usage.redeemed_by_phone {
        return Err(Rejection::AlreadyRedeemed);
    }
    if now >= discount.expires_at {
        return Err(Rejection::Expired);
    }
    if now < discount.created_at {
        return Err(Rejection::NotYetValid);
    }
    Ok(())
}

//! Error types for discount management and redemption.

use std::time::Duration;
use thiserror::Error;

use super::validator::Rejection;
use crate::Amount;
use crate::model::RedemptionId;
use crate::store::StoreError;
use crate::wallet::{BalanceError, WalletError};

/// Error while creating or reading discounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountError {
    #[error("discount {0} not found")]
    NotFound(String),

    #[error("discount code {0} already exists")]
    AlreadyExists(String),

    #[error("invalid discount amount {0}")]
    InvalidAmount(Amount),

    #[error("usage limit must be greater than zero")]
    InvalidUsageLimit,

    #[error("expiration must be in the future")]
    InvalidExpiration,

    #[error("discount code must not be empty")]
    InvalidCode,

    #[error("no free discount code after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("{0}")]
    Store(#[from] StoreError),
}

/// Failure inside the worker's allocation step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("{0}")]
    Rejected(#[from] Rejection),

    #[error("could not read discount usage: {0}")]
    UsageRead(StoreError),

    #[error("could not fetch wallet: {0}")]
    Wallet(#[from] WalletError),

    #[error("could not record redemption: {0}")]
    Marker(StoreError),

    /// The charge failed and the redemption marker was removed again.
    #[error("charge failed, redemption {redemption} rolled back: {source}")]
    ChargeFailed {
        redemption: RedemptionId,
        source: BalanceError,
    },

    /// The charge failed and the marker could not be removed: the discount
    /// is counted as used without any money having moved.
    #[error(
        "charge failed and redemption {redemption} could not be rolled back: {compensation} (charge error: {charge})"
    )]
    CompensationFailed {
        redemption: RedemptionId,
        charge: BalanceError,
        compensation: StoreError,
    },
}

/// Error returned by [`DiscountService::apply`](super::DiscountService::apply).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedeemError {
    #[error("discount {0} not found")]
    NotFound(String),

    #[error("{0}")]
    Rejected(#[from] Rejection),

    #[error("redemption queue is full")]
    Busy,

    #[error("redemption worker is shutting down")]
    ShuttingDown,

    #[error("redemption worker dropped the request")]
    WorkerLost,

    #[error("no redemption outcome within {0:?}")]
    Timeout(Duration),

    #[error("redemption wait cancelled")]
    Cancelled,

    #[error("redemption failed: {0}")]
    Allocation(AllocationError),

    #[error("{0}")]
    Store(#[from] StoreError),
}

impl From<AllocationError> for RedeemError {
    fn from(e: AllocationError) -> Self {
        match e {
            AllocationError::Rejected(rejection) => RedeemError::Rejected(rejection),
            other => RedeemError::Allocation(other),
        }
    }
}

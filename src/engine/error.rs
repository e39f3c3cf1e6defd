//! Engine errors and their stable, user-facing codes.

use std::fmt;
use thiserror::Error;

use crate::discount::{AllocationError, DiscountError, RedeemError, Rejection};
use crate::wallet::WalletError;

/// Top-level error returned by [`Engine::apply`](super::Engine::apply).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("{0}")]
    Wallet(#[from] WalletError),

    #[error("{0}")]
    Discount(#[from] DiscountError),

    #[error("{0}")]
    Redeem(#[from] RedeemError),
}

/// Enumerable failure code reported instead of raw error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotFound,
    AlreadyExists,
    InvalidInput,
    UsageLimitExceeded,
    AlreadyRedeemed,
    Expired,
    NotYetValid,
    InsufficientFunds,
    PersistenceFailure,
    /// A redemption marker could not be rolled back; needs reconciliation.
    CompensationFailure,
    Busy,
    Unavailable,
    Timeout,
    Cancelled,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::AlreadyExists => "already_exists",
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::UsageLimitExceeded => "usage_limit_exceeded",
            ErrorCode::AlreadyRedeemed => "already_redeemed",
            ErrorCode::Expired => "expired",
            ErrorCode::NotYetValid => "not_yet_valid",
            ErrorCode::InsufficientFunds => "insufficient_funds",
            ErrorCode::PersistenceFailure => "persistence_failure",
            ErrorCode::CompensationFailure => "compensation_failure",
            ErrorCode::Busy => "busy",
            ErrorCode::Unavailable => "unavailable",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Wallet(e) => e.code(),
            EngineError::Discount(e) => e.code(),
            EngineError::Redeem(e) => e.code(),
        }
    }
}

impl Rejection {
    pub fn code(&self) -> ErrorCode {
        match self {
            Rejection::UsageLimitExceeded => ErrorCode::UsageLimitExceeded,
            Rejection::AlreadyRedeemed => ErrorCode::AlreadyRedeemed,
            Rejection::Expired => ErrorCode::Expired,
            Rejection::NotYetValid => ErrorCode::NotYetValid,
        }
    }
}

impl WalletError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WalletError::NotFound(_) => ErrorCode::NotFound,
            WalletError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            WalletError::InsufficientFunds(..) => ErrorCode::InsufficientFunds,
            WalletError::InvalidAmount(_) => ErrorCode::InvalidInput,
            WalletError::Balance(_) | WalletError::Store(_) => ErrorCode::PersistenceFailure,
        }
    }
}

impl DiscountError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DiscountError::NotFound(_) => ErrorCode::NotFound,
            DiscountError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            DiscountError::InvalidAmount(_)
            | DiscountError::InvalidUsageLimit
            | DiscountError::InvalidExpiration
            | DiscountError::InvalidCode => ErrorCode::InvalidInput,
            DiscountError::CodeSpaceExhausted(_) => ErrorCode::Unavailable,
            DiscountError::Store(_) => ErrorCode::PersistenceFailure,
        }
    }
}

impl AllocationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AllocationError::Rejected(rejection) => rejection.code(),
            AllocationError::Wallet(e) => e.code(),
            AllocationError::UsageRead(_)
            | AllocationError::Marker(_)
            | AllocationError::ChargeFailed { .. } => ErrorCode::PersistenceFailure,
            AllocationError::CompensationFailed { .. } => ErrorCode::CompensationFailure,
        }
    }
}

impl RedeemError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RedeemError::NotFound(_) => ErrorCode::NotFound,
            RedeemError::Rejected(rejection) => rejection.code(),
            RedeemError::Busy => ErrorCode::Busy,
            RedeemError::ShuttingDown | RedeemError::WorkerLost => ErrorCode::Unavailable,
            RedeemError::Timeout(_) => ErrorCode::Timeout,
            RedeemError::Cancelled => ErrorCode::Cancelled,
            RedeemError::Allocation(e) => e.code(),
            RedeemError::Store(_) => ErrorCode::PersistenceFailure,
        }
    }
}

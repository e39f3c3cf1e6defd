//! Discount codes and their redemption.
//!
//! [`DiscountService::apply`] validates a code, hands the allocation to the
//! [`RedemptionWorker`] and waits a bounded time for its outcome.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::model::{Discount, NewDiscount, Redemption};
use crate::store::{DiscountStore, RedemptionStore, StoreError, Stores};

pub mod code;
pub mod validator;
pub use validator::{Rejection, Usage};

mod worker;
pub use worker::{Allocation, RedemptionWorker, WorkerHandle};
use worker::Job;

mod error;
pub use error::{AllocationError, DiscountError, RedeemError};

/// Attempts at finding an unused generated code.
const CODE_ATTEMPTS: usize = 5;

/// Read the redemption state of `discount` for `phone`.
pub(crate) async fn read_usage(
    discounts: &dyn DiscountStore,
    discount: &Discount,
    phone: &str,
) -> Result<Usage, StoreError> {
    Ok(Usage {
        count: discounts.count_redemptions(discount.id).await?,
        redeemed_by_phone: discounts.has_redeemed(discount.id, phone).await?,
    })
}

#[derive(Clone)]
pub struct DiscountService {
    discounts: Arc<dyn DiscountStore>,
    redemptions: Arc<dyn RedemptionStore>,
    worker: WorkerHandle,
    redemption_timeout: Duration,
    discount_ttl: Duration,
    code_length: usize,
}

/// Public API
impl DiscountService {
    /// Build the service and start its redemption worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(stores: &Stores, config: &Config) -> Self {
        let worker = RedemptionWorker::new(stores).spawn(config.queue_capacity);
        Self {
            discounts: stores.discounts.clone(),
            redemptions: stores.redemptions.clone(),
            worker,
            redemption_timeout: config.redemption_timeout,
            discount_ttl: config.discount_ttl,
            code_length: config.code_length,
        }
    }

    /// Define a new discount, generating its code and expiration when the
    /// request leaves them out.
    pub async fn create(&self, new: NewDiscount) -> Result<Discount, DiscountError> {
        if new.amount.is_negative() {
            return Err(DiscountError::InvalidAmount(new.amount));
        }
        if new.usage_limit == 0 {
            return Err(DiscountError::InvalidUsageLimit);
        }

        let now = Utc::now();
        let expires_at = match new.expires_at {
            Some(at) => at,
            None => {
                let ttl = chrono::Duration::from_std(self.discount_ttl)
                    .map_err(|_| DiscountError::InvalidExpiration)?;
                now.checked_add_signed(ttl)
                    .ok_or(DiscountError::InvalidExpiration)?
            }
        };
        if expires_at <= now {
            return Err(DiscountError::InvalidExpiration);
        }

        let mut discount = Discount {
            id: uuid::Uuid::new_v4(),
            code: String::new(),
            description: new.description,
            amount: new.amount,
            usage_limit: new.usage_limit,
            expires_at,
            kind: new.kind,
            created_at: now,
        };

        if let Some(code) = new.code {
            let code = code.trim();
            if code.is_empty() {
                return Err(DiscountError::InvalidCode);
            }
            discount.code = code.to_string();
            return self.insert(discount).await;
        }

        for _ in 0..CODE_ATTEMPTS {
            discount.code = code::generate(self.code_length);
            match self.insert(discount.clone()).await {
                Err(DiscountError::AlreadyExists(taken)) => {
                    debug!(code = %taken, "generated discount code already taken");
                }
                result => return result,
            }
        }
        Err(DiscountError::CodeSpaceExhausted(CODE_ATTEMPTS))
    }

    pub async fn get(&self, code: &str) -> Result<Discount, DiscountError> {
        self.discounts.get_by_code(code).await.map_err(|e| {
            if e.is_not_found() {
                DiscountError::NotFound(code.to_string())
            } else {
                e.into()
            }
        })
    }

    /// A discount together with every redemption recorded for it.
    pub async fn usages(&self, code: &str) -> Result<(Discount, Vec<Redemption>), DiscountError> {
        let discount = self.get(code).await?;
        let redemptions = self.redemptions.list_redemptions(discount.id).await?;
        Ok((discount, redemptions))
    }

    /// Redeem `code` into the wallet of `phone`, creating the wallet if
    /// needed. Returns the redeemed discount.
    pub async fn apply(&self, code: &str, phone: &str) -> Result<Discount, RedeemError> {
        self.apply_until(code, phone, &CancellationToken::new())
            .await
    }

    /// Like [`apply`](Self::apply), but stops waiting once `cancel` fires.
    ///
    /// Neither cancellation nor the timeout withdraws a job the worker has
    /// accepted; it may still complete afterwards.
    pub async fn apply_until(
        &self,
        code: &str,
        phone: &str,
        cancel: &CancellationToken,
    ) -> Result<Discount, RedeemError> {
        let discount = self.discounts.get_by_code(code).await.map_err(|e| {
            if e.is_not_found() {
                RedeemError::NotFound(code.to_string())
            } else {
                e.into()
            }
        })?;

        let usage = read_usage(self.discounts.as_ref(), &discount, phone).await?;
        if let Err(rejection) = validator::check(&discount, usage, Utc::now()) {
            info!(code, phone, reason = %rejection, "redemption rejected");
            return Err(rejection.into());
        }

        let (reply, response) = oneshot::channel();
        self.worker.submit(Job::new(discount.clone(), phone, reply))?;

        tokio::select! {
            outcome = response => match outcome {
                Ok(Ok(allocation)) => {
                    info!(
                        code,
                        phone,
                        wallet = %allocation.wallet,
                        balance = %allocation.mutation.balance,
                        "discount applied"
                    );
                    Ok(discount)
                }
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(RedeemError::WorkerLost),
            },
            _ = cancel.cancelled() => {
                warn!(code, phone, "redemption wait cancelled");
                Err(RedeemError::Cancelled)
            }
            _ = tokio::time::sleep(self.redemption_timeout) => {
                warn!(code, phone, timeout = ?self.redemption_timeout, "redemption timed out");
                Err(RedeemError::Timeout(self.redemption_timeout))
            }
        }
    }

    pub fn worker(&self) -> &WorkerHandle {
        &self.worker
    }

    /// Drain the redemption queue and stop the worker.
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }
}

/// Private API
impl DiscountService {
    async fn insert(&self, discount: Discount) -> Result<Discount, DiscountError> {
        match self.discounts.create_discount(discount).await {
            Ok(discount) => {
                info!(
                    code = %discount.code,
                    amount = %discount.amount,
                    usage_limit = discount.usage_limit,
                    kind = %discount.kind,
                    "discount created"
                );
                Ok(discount)
            }
            Err(StoreError::Conflict { key, .. }) => Err(DiscountError::AlreadyExists(key)),
            Err(e) => Err(e.into()),
        }
    }
}

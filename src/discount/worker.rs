//! Sequential redemption worker.
//!
//! One task drains a bounded FIFO queue of redemption jobs and runs each
//! allocation to completion before taking the next. The usage checks are
//! repeated inside that serialized step, so the queue order is what keeps
//! the usage limit and the one-redemption-per-phone rule race-free.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::error::{AllocationError, RedeemError};
use super::validator::{self, Rejection};
use crate::model::{Direction, Discount, Redemption, WalletId};
use crate::store::{DiscountStore, RedemptionStore, Stores};
use crate::wallet::{Mutation, WalletLedger};

/// Outcome of a committed redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub wallet: WalletId,
    pub redemption: Redemption,
    pub mutation: Mutation,
}

type Reply = oneshot::Sender<Result<Allocation, AllocationError>>;

/// A queued request to redeem `discount` for `phone`.
pub(crate) struct Job {
    discount: Discount,
    phone: String,
    reply: Reply,
}

impl Job {
    pub(crate) fn new(discount: Discount, phone: &str, reply: Reply) -> Self {
        Self {
            discount,
            phone: phone.to_string(),
            reply,
        }
    }
}

/// Handle used to submit jobs to, and stop, a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    jobs: mpsc::Sender<Job>,
    shutdown: CancellationToken,
    /// Cancelled once the worker task has exited, however it exited.
    stopped: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl WorkerHandle {
    /// Enqueue a job without waiting for queue space.
    pub(crate) fn submit(&self, job: Job) -> Result<(), RedeemError> {
        self.jobs.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RedeemError::Busy,
            mpsc::error::TrySendError::Closed(_) => RedeemError::ShuttingDown,
        })
    }

    pub fn is_running(&self) -> bool {
        !self.jobs.is_closed()
    }

    /// Stop admitting jobs, finish every job already queued, then wait for
    /// the worker task to exit. Every caller, concurrent or later, returns
    /// only after the worker has stopped.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(reason = %e, "redemption worker terminated abnormally");
            }
        }
        self.stopped.cancelled().await;
    }
}

pub struct RedemptionWorker {
    discounts: Arc<dyn DiscountStore>,
    redemptions: Arc<dyn RedemptionStore>,
    wallets: WalletLedger,
}

impl RedemptionWorker {
    pub fn new(stores: &Stores) -> Self {
        Self {
            discounts: stores.discounts.clone(),
            redemptions: stores.redemptions.clone(),
            wallets: WalletLedger::new(stores),
        }
    }

    /// Start the worker on the current tokio runtime with a queue of
    /// `capacity` pending jobs.
    pub fn spawn(self, capacity: usize) -> WorkerHandle {
        let (jobs, queue) = mpsc::channel(capacity);
        let shutdown = CancellationToken::new();
        let stopped = CancellationToken::new();
        let task = tokio::spawn(self.run(queue, shutdown.clone(), stopped.clone()));
        WorkerHandle {
            jobs,
            shutdown,
            stopped,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn run(
        self,
        mut queue: mpsc::Receiver<Job>,
        shutdown: CancellationToken,
        stopped: CancellationToken,
    ) {
        let _stopped = stopped.drop_guard();
        info!("redemption worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    queue.close();
                    let mut drained = 0usize;
                    while let Some(job) = queue.recv().await {
                        self.handle(job).await;
                        drained += 1;
                    }
                    info!(drained, "redemption worker drained its queue");
                    break;
                }
                job = queue.recv() => {
                    let Some(job) = job else {
                        info!("redemption queue closed, worker stopping");
                        break;
                    };
                    self.handle(job).await;
                }
            }
        }

        info!("redemption worker stopped");
    }

    async fn handle(&self, job: Job) {
        let Job {
            discount,
            phone,
            reply,
        } = job;

        let outcome = self.allocate(&discount, &phone).await;

        // The caller may have timed out or been cancelled; the work is done anyway
        if let Err(outcome) = reply.send(outcome) {
            warn!(
                code = %discount.code,
                phone = %phone,
                succeeded = outcome.is_ok(),
                "redemption finished after its caller stopped waiting"
            );
        }
    }

    /// Get-or-create the wallet, mark the discount used, charge the wallet,
    /// and remove the mark again if the charge fails.
    async fn allocate(&self, discount: &Discount, phone: &str) -> Result<Allocation, AllocationError> {
        let usage = super::read_usage(self.discounts.as_ref(), discount, phone)
            .await
            .map_err(AllocationError::UsageRead)?;
        validator::check(discount, usage, Utc::now())?;

        let wallet = self.wallets.get_or_create(phone).await?;

        let redemption = match self
            .redemptions
            .insert_redemption(discount.id, wallet.id, phone)
            .await
        {
            Ok(redemption) => redemption,
            Err(e) if e.is_conflict() => return Err(Rejection::AlreadyRedeemed.into()),
            Err(e) => return Err(AllocationError::Marker(e)),
        };

        let charge = match self
            .wallets
            .mutate_balance(
                &wallet,
                Direction::Deposit,
                discount.amount,
                &discount.description,
            )
            .await
        {
            Ok(mutation) => {
                info!(
                    code = %discount.code,
                    phone,
                    redemption = %redemption.id,
                    amount = %discount.amount,
                    kind = %discount.kind,
                    "successfully charged wallet"
                );
                return Ok(Allocation {
                    wallet: wallet.id,
                    redemption,
                    mutation,
                });
            }
            Err(charge) => charge,
        };

        error!(
            code = %discount.code,
            wallet = %wallet.id,
            reason = %charge,
            "failed to deposit wallet"
        );

        match self.redemptions.delete_redemption(redemption.id).await {
            Ok(()) => {
                warn!(
                    code = %discount.code,
                    phone,
                    redemption = %redemption.id,
                    "redemption rolled back"
                );
                Err(AllocationError::ChargeFailed {
                    redemption: redemption.id,
                    source: charge,
                })
            }
            Err(compensation) => {
                error!(
                    code = %discount.code,
                    phone,
                    redemption = %redemption.id,
                    charge = %charge,
                    reason = %compensation,
                    "failed to rollback usage; orphaned redemption needs manual reconciliation"
                );
                Err(AllocationError::CompensationFailed {
                    redemption: redemption.id,
                    charge,
                    compensation,
                })
            }
        }
    }
}

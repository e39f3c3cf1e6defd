//! Wallet ledger engine.
//!
//! The engine owns the wallet ledger and the discount service and applies
//! commands against them: registrations, deposits, withdrawals, discount
//! creation, redemptions and wallet removal.
//! Also supports an async stream of commands.

use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::config::Config;
use crate::discount::DiscountService;
use crate::model::{Command, Direction, Discount, DiscountSummary, Wallet};
use crate::store::Stores;
use crate::wallet::{Mutation, WalletLedger};

mod error;
pub use error::{EngineError, ErrorCode};

/// What a successfully applied command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Wallet(Wallet),
    Entry(Mutation),
    Discount(Discount),
    Redeemed(DiscountSummary),
}

pub struct Engine {
    wallets: WalletLedger,
    discounts: DiscountService,
}

/// Public API
impl Engine {
    /// Build an engine over `stores`; starts the redemption worker, so it
    /// must be called from within a tokio runtime.
    pub fn new(stores: Stores, config: &Config) -> Self {
        Self {
            wallets: WalletLedger::new(&stores),
            discounts: DiscountService::new(&stores, config),
        }
    }

    pub fn in_memory(config: &Config) -> Self {
        Self::new(Stores::in_memory(), config)
    }

    /// Run the engine with the given command stream
    pub async fn run(&self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // any error should not stop the engine, so we just ignore the application result
            let _ = self.apply(command).await;
        }
    }

    /// Apply a single command on top of the current ledger state
    pub async fn apply(&self, command: Command) -> Result<Outcome, EngineError> {
        let kind = command.kind();
        let subject = subject(&command);
        let result = self.dispatch(command).await;
        Self::log_result(kind, &subject, &result);
        result
    }

    pub fn wallets(&self) -> &WalletLedger {
        &self.wallets
    }

    pub fn discounts(&self) -> &DiscountService {
        &self.discounts
    }

    /// Finish queued redemptions and stop the worker.
    pub async fn shutdown(&self) {
        self.discounts.shutdown().await;
    }
}

/// Private API
impl Engine {
    async fn dispatch(&self, command: Command) -> Result<Outcome, EngineError> {
        match command {
            Command::Register { phone } => Ok(Outcome::Wallet(self.wallets.register(&phone).await?)),
            Command::Deposit {
                phone,
                amount,
                description,
            } => Ok(Outcome::Entry(
                self.wallets
                    .transact(&phone, Direction::Deposit, amount, &description)
                    .await?,
            )),
            Command::Withdrawal {
                phone,
                amount,
                description,
            } => Ok(Outcome::Entry(
                self.wallets
                    .transact(&phone, Direction::Withdrawal, amount, &description)
                    .await?,
            )),
            Command::CreateDiscount(new) => {
                Ok(Outcome::Discount(self.discounts.create(new).await?))
            }
            Command::Redeem { code, phone } => {
                let discount = self.discounts.apply(&code, &phone).await?;
                Ok(Outcome::Redeemed(discount.summary()))
            }
            Command::DeleteWallet { phone } => {
                Ok(Outcome::Wallet(self.wallets.delete(&phone).await?))
            }
        }
    }

    /// Small helper to log `apply` results
    fn log_result(kind: &str, subject: &str, result: &Result<Outcome, EngineError>) {
        match result {
            Ok(_) => info!(subject, "{kind} applied"),
            Err(e) => warn!(
                subject,
                code = %e.code(),
                reason = %e,
                "{kind} skipped"
            ),
        }
    }
}

/// Phone number or discount code a command is about, for logging.
fn subject(command: &Command) -> String {
    match command {
        Command::Register { phone }
        | Command::Deposit { phone, .. }
        | Command::Withdrawal { phone, .. }
        | Command::DeleteWallet { phone } => phone.clone(),
        Command::CreateDiscount(new) => new.code.clone().unwrap_or_else(|| "-".to_string()),
        Command::Redeem { code, phone } => format!("{code}/{phone}"),
    }
}

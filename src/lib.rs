pub mod amount;
pub mod config;
pub mod csv;
pub mod discount;
pub mod engine;
pub mod model;
pub mod store;
pub mod wallet;

pub use amount::Amount;
pub use config::Config;
pub use engine::{Engine, EngineError, ErrorCode, Outcome};
pub use model::{Command, Discount, LedgerEntry, Wallet};

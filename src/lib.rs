//! Ledger and financial-instrument engine of a retail bank.
//!
//! Balances only change through the ledger, and every change is journaled in
//! the same unit of work. Instruments (cheques, fixed deposits, loans and
//! requests that need an admin's approval) are state machines on top of it.

pub mod bank;
pub mod clock;
pub mod config;
pub mod error;
pub mod error_handler;
pub mod input;
pub mod instruments;
pub mod interest;
pub mod ledger;
pub mod output;
pub mod process;
pub mod run;
pub mod scheduler;

pub(crate) mod store;

pub use bank::Bank;
pub use config::BankConfig;
pub use error::{BankError, Result};
pub use instruments::Outcome;
pub use scheduler::{SettlementReport, SettlementScheduler};

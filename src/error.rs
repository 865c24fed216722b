use crate::ledger::{AccountNumber, Amount};

use thiserror::Error;

/// Everything that can go wrong while moving money or driving an instrument.
///
/// Validation and state-guard errors are always raised before any balance is
/// touched. `InsufficientFunds` leaves the instrument where it was, so the
/// same operation can be retried once the account is funded.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BankError {
    #[error("account {0} does not exist")]
    AccountNotFound(AccountNumber),

    #[error("account {0} already exists")]
    DuplicateAccount(AccountNumber),

    /// Credits and debits are only applied to active accounts.
    #[error("account {account} is {status} and cannot be credited or debited")]
    AccountInactive {
        account: AccountNumber,
        status: String,
    },

    #[error("invalid amount {0}: amounts must be strictly positive")]
    InvalidAmount(Amount),

    #[error("insufficient funds on account {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: AccountNumber,
        requested: Amount,
        available: Amount,
    },

    /// The instrument is not in the status the operation requires.
    #[error("{instrument} {id} is {current}: cannot {operation}")]
    InvalidStateTransition {
        instrument: &'static str,
        id: u64,
        current: String,
        operation: &'static str,
    },

    /// Idempotency guard: the work has already been done.
    #[error("already processed: {0}")]
    AlreadyProcessed(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("{instrument} {id} does not exist")]
    InstrumentNotFound { instrument: &'static str, id: u64 },

    /// Adding more money to a balance would overflow.
    #[error("arithmetic overflow")]
    Overflow,
}

impl BankError {
    pub(crate) fn transition(
        instrument: &'static str,
        id: u64,
        current: impl std::fmt::Display,
        operation: &'static str,
    ) -> Self {
        Self::InvalidStateTransition {
            instrument,
            id,
            current: current.to_string(),
            operation,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }
}

pub type Result<T> = std::result::Result<T, BankError>;

#[cfg(test)]
mod tests {
    use super::BankError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_messages() {
        let err = BankError::InsufficientFunds {
            account: "ACC1".to_string(),
            requested: dec!(1000.00),
            available: dec!(500.00),
        };
        assert_eq!(
            "insufficient funds on account ACC1: requested 1000.00, available 500.00",
            err.to_string()
        );

        let err = BankError::transition("cheque", 7, "DRAWN", "cancel");
        assert_eq!("cheque 7 is DRAWN: cannot cancel", err.to_string());
    }
}

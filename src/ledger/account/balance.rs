use crate::error::{BankError, Result};
use crate::ledger::Amount;

use serde::Serialize;

/// The money held on an account.
///
/// It can never go below zero: `subtract` refuses to, and the caller is
/// expected to have turned that into `InsufficientFunds` beforehand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Balance(Amount);

impl Balance {
    pub fn amount(&self) -> Amount {
        self.0
    }

    pub fn add(&mut self, amount: Amount) -> Result<()> {
        self.0 = self.0.checked_add(amount).ok_or(BankError::Overflow)?;

        Ok(())
    }

    pub fn subtract(&mut self, amount: Amount) -> Result<()> {
        let remaining = self.0.checked_sub(amount).ok_or(BankError::Overflow)?;
        if remaining < Amount::ZERO {
            return Err(BankError::Overflow);
        }
        self.0 = remaining;

        Ok(())
    }

    pub const fn zero() -> Self {
        Self(Amount::ZERO)
    }

    #[cfg(test)]
    pub const fn new(amount: Amount) -> Self {
        Self(amount)
    }
}

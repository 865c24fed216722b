use crate::error::{BankError, Result};
use crate::ledger::Amount;

use super::Account;

impl Account {
    /// `amount` has already been validated and rounded by the ledger.
    pub(in crate::ledger) fn apply_debit(&mut self, amount: Amount) -> Result<Amount> {
        self.ensure_active()?;

        if amount > self.balance.amount() {
            return Err(BankError::InsufficientFunds {
                account: self.account_number.clone(),
                requested: amount,
                available: self.balance.amount(),
            });
        }

        self.balance.subtract(amount)?;

        Ok(self.balance.amount())
    }
}

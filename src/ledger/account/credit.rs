use crate::error::Result;
use crate::ledger::Amount;

use super::Account;

impl Account {
    /// `amount` has already been validated and rounded by the ledger.
    pub(in crate::ledger) fn apply_credit(&mut self, amount: Amount) -> Result<Amount> {
        self.ensure_active()?;
        self.balance.add(amount)?;

        Ok(self.balance.amount())
    }
}

#[cfg(test)]
mod credit_tests {
    use crate::error::BankError;
    use crate::ledger::account::{Account, AccountHolder, AccountStatus, Balance};

    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn account(balance: rust_decimal::Decimal, status: AccountStatus) -> Account {
        let mut acc = Account::new("ACC1".to_string(), AccountHolder::new("Meera"), Utc::now());
        acc.balance = Balance::new(balance);
        acc.status = status;
        acc
    }

    #[test]
    fn test_credit_ok() {
        let mut acc = account(dec!(3.00), AccountStatus::Active);

        let got = acc.apply_credit(dec!(3.50));
        assert_eq!(Ok(dec!(6.50)), got);
        assert_eq!(dec!(6.50), acc.balance());
    }

    #[test]
    fn test_credit_inactive_account() {
        for status in vec![AccountStatus::Frozen, AccountStatus::Closed] {
            let mut acc = account(dec!(99.99), status);

            let got = acc.apply_credit(dec!(3.00));
            assert_eq!(
                Err(BankError::AccountInactive {
                    account: "ACC1".to_string(),
                    status: status.to_string(),
                }),
                got
            );
            assert_eq!(dec!(99.99), acc.balance());
        }
    }
}

//! The account ledger and its journal.
//!
//! Ledger: the only code allowed to change an account balance.
//! Journal: the append-only record of every balance change, each entry carrying
//! the balance the account had right after the change.

pub mod account;
pub mod journal;

use crate::error::{BankError, Result};
use crate::store::Table;

use account::Account;
use rust_decimal::RoundingStrategy;

// Using named types doesn't provide any compiler help, but it helps a lot with
// readability: `Table<AccountNumber, Account>` explains itself where
// `Table<String, Account>` would need a comment.
pub type AccountNumber = String;
pub type InstrumentId = u64;

// A decimal library instead of f64, to be safe when dealing with money and to
// keep the precision easy to reason about.
pub type Amount = rust_decimal::Decimal;
pub const MONEY_PRECISION: u32 = 2;

/// Round an amount to the precision balances are kept at. The result always
/// carries exactly `MONEY_PRECISION` decimal places, so `5` prints as `5.00`.
pub fn round_money(amount: Amount) -> Amount {
    let mut rounded = amount.round_dp_with_strategy(MONEY_PRECISION, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_PRECISION);
    rounded
}

/// Round an amount and make sure there is still something left to move.
pub fn validate_amount(amount: Amount) -> Result<Amount> {
    let rounded = round_money(amount);
    if rounded <= Amount::ZERO {
        return Err(BankError::InvalidAmount(amount));
    }

    Ok(rounded)
}

/// Add `amount` to the account and return the new balance.
///
/// Must run inside a unit of work: the row lookup, the status check and the
/// write happen while the store is locked, so nothing can interleave.
pub(crate) fn credit(
    accounts: &mut Table<AccountNumber, Account>,
    account_number: &str,
    amount: Amount,
) -> Result<Amount> {
    let amount = validate_amount(amount)?;
    let account = accounts
        .get_mut(account_number)
        .ok_or_else(|| BankError::AccountNotFound(account_number.to_string()))?;

    account.apply_credit(amount)
}

/// Remove `amount` from the account and return the new balance.
///
/// This is the `balance = balance - amount WHERE balance >= amount` of the
/// ledger: the funds check and the write are the same step.
pub(crate) fn debit(
    accounts: &mut Table<AccountNumber, Account>,
    account_number: &str,
    amount: Amount,
) -> Result<Amount> {
    let amount = validate_amount(amount)?;
    let account = accounts
        .get_mut(account_number)
        .ok_or_else(|| BankError::AccountNotFound(account_number.to_string()))?;

    account.apply_debit(amount)
}

#[cfg(test)]
mod tests {
    use super::{round_money, validate_amount};
    use crate::error::BankError;
    use rust_decimal_macros::dec;

    #[test]
    // Balances are kept at 2 decimal places, rounding half away from zero.
    fn test_money_precision() {
        for (raw_amount, want_amount) in vec![
            (dec!(1.0), dec!(1.00)),
            (dec!(0.999), dec!(1.00)),
            (dec!(1.005), dec!(1.01)),
            (dec!(1.004), dec!(1.00)),
            (dec!(10661.8546), dec!(10661.85)),
        ] {
            assert_eq!(want_amount, round_money(raw_amount));
        }

        assert_eq!("5.00", round_money(dec!(5)).to_string());
    }

    #[test]
    fn test_validate_amount() {
        assert_eq!(Ok(dec!(12.35)), validate_amount(dec!(12.345)));

        for amount in vec![dec!(0), dec!(-1), dec!(0.004)] {
            assert_eq!(Err(BankError::InvalidAmount(amount)), validate_amount(amount));
        }
    }
}

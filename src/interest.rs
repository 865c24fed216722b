//! Interest and amortization math.
//!
//! Pure functions only: nothing here reads the clock or touches an account.
//! Intermediate values keep full decimal precision, results are rounded to
//! the money precision.

use crate::config::{GoldLoanConfig, SubsidyConfig};
use crate::error::{BankError, Result};
use crate::ledger::{round_money, Amount};

use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::Serialize;

/// Annual rate in percent to a monthly rate as a fraction.
pub fn monthly_rate(annual_rate_percent: Decimal) -> Decimal {
    annual_rate_percent / dec!(1200)
}

/// Equated monthly installment: `P·r·(1+r)^n / ((1+r)^n − 1)`.
pub fn emi(principal: Amount, annual_rate_percent: Decimal, tenure_months: u32) -> Result<Amount> {
    if tenure_months == 0 {
        return Err(BankError::validation("tenure must be at least one month"));
    }

    let rate = monthly_rate(annual_rate_percent);
    if rate.is_zero() {
        return Ok(round_money(principal / Decimal::from(tenure_months)));
    }

    let growth = (Decimal::ONE + rate)
        .checked_powi(i64::from(tenure_months))
        .ok_or(BankError::Overflow)?;
    let payment = principal
        .checked_mul(rate)
        .and_then(|value| value.checked_mul(growth))
        .and_then(|value| value.checked_div(growth - Decimal::ONE))
        .ok_or(BankError::Overflow)?;

    Ok(round_money(payment))
}

/// One month of an amortizing loan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Installment {
    pub number: u32,
    pub due_date: NaiveDate,
    pub principal: Amount,
    pub interest: Amount,
    pub total: Amount,
    /// Principal still owed once this installment is paid.
    pub remaining_principal: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Period {
    principal: Amount,
    interest: Amount,
    remaining: Amount,
}

// Split each payment into interest on what is still owed and principal.
// The last period takes whatever principal is left, so rounding drift never
// survives the schedule.
fn periods(principal: Amount, annual_rate_percent: Decimal, tenure_months: u32) -> Result<Vec<Period>> {
    let payment = emi(principal, annual_rate_percent, tenure_months)?;
    let rate = monthly_rate(annual_rate_percent);
    let mut remaining = round_money(principal);

    let mut periods = Vec::with_capacity(tenure_months as usize);
    for number in 1..=tenure_months {
        let interest = round_money(remaining * rate);
        let principal_part = if number == tenure_months {
            remaining
        } else {
            (payment - interest).max(Decimal::ZERO).min(remaining)
        };
        remaining -= principal_part;

        periods.push(Period {
            principal: principal_part,
            interest,
            remaining,
        });
    }

    Ok(periods)
}

/// The full repayment schedule of a loan, first installment due one month
/// after `start_date`.
///
/// The principal components always add up to the principal (rounded to the
/// money precision).
pub fn amortization_schedule(
    principal: Amount,
    annual_rate_percent: Decimal,
    tenure_months: u32,
    start_date: NaiveDate,
) -> Result<Vec<Installment>> {
    periods(principal, annual_rate_percent, tenure_months)?
        .into_iter()
        .zip(1..)
        .map(|(period, number)| {
            Ok(Installment {
                number,
                due_date: add_months(start_date, number)?,
                principal: period.principal,
                interest: period.interest,
                total: period.principal + period.interest,
                remaining_principal: period.remaining,
            })
        })
        .collect()
}

/// `date` plus `months` calendar months, clamped to the end of the month.
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or(BankError::Overflow)
}

/// Compound growth: `P·(1 + rate/100)^(months/12)`.
pub fn maturity_amount(
    principal: Amount,
    annual_rate_percent: Decimal,
    tenure_months: u32,
) -> Result<Amount> {
    if annual_rate_percent.is_zero() {
        return Ok(round_money(principal));
    }

    let base = Decimal::ONE + annual_rate_percent / dec!(100);
    let factor = if tenure_months % 12 == 0 {
        base.checked_powi(i64::from(tenure_months / 12))
    } else {
        base.checked_powd(Decimal::from(tenure_months) / dec!(12))
    }
    .ok_or(BankError::Overflow)?;

    let amount = principal.checked_mul(factor).ok_or(BankError::Overflow)?;
    Ok(round_money(amount))
}

/// Interest paid out every month on a fixed deposit. Never compounded.
pub fn monthly_simple_interest(principal: Amount, annual_rate_percent: Decimal) -> Amount {
    round_money(principal * annual_rate_percent / dec!(1200))
}

/// Interest accrued over the first months of a loan repaid on the notional
/// tenure. Used to estimate the education-loan interest subsidy.
pub fn three_year_interest_projection(
    principal: Amount,
    annual_rate_percent: Decimal,
    subsidy: &SubsidyConfig,
) -> Result<Amount> {
    let interest = periods(principal, annual_rate_percent, subsidy.notional_tenure_months)?
        .into_iter()
        .take(subsidy.projection_periods as usize)
        .map(|period| period.interest)
        .sum();

    Ok(interest)
}

/// How much can be lent against a quantity of gold.
pub fn gold_loan_eligibility(weight_grams: Decimal, purity_karat: u32, gold: &GoldLoanConfig) -> Amount {
    let fineness = Decimal::from(purity_karat) / dec!(24);
    round_money(weight_grams * gold.rate_per_gram * fineness * gold.loan_to_value)
}

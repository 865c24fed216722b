use super::{approve, ensure_account, reject, validate_rate, Approvable, ApprovalStatus, Instrument, Outcome, Stamp};
use crate::bank::Bank;
use crate::error::{BankError, Result};
use crate::interest;
use crate::ledger::journal::EntryType;
use crate::ledger::{validate_amount, AccountNumber, Amount, InstrumentId};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentKind {
    MutualFund,
    Bond,
    Equity,
}

impl fmt::Display for InvestmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvestmentKind::MutualFund => write!(f, "mutual fund"),
            InvestmentKind::Bond => write!(f, "bond"),
            InvestmentKind::Equity => write!(f, "equity"),
        }
    }
}

impl FromStr for InvestmentKind {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mutual_fund" | "mutual fund" => Ok(InvestmentKind::MutualFund),
            "bond" => Ok(InvestmentKind::Bond),
            "equity" => Ok(InvestmentKind::Equity),
            other => Err(BankError::validation(format!("unknown investment kind {:?}", other))),
        }
    }
}

/// Money moved out of the account into a product. Approval debits it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Investment {
    pub id: InstrumentId,
    pub account_number: AccountNumber,
    pub kind: InvestmentKind,
    pub amount: Amount,
    pub expected_return_rate: Decimal,
    pub tenure_months: u32,
    /// What the amount grows to at the expected rate. An estimate only.
    pub projected_value: Amount,
    pub status: ApprovalStatus,
    pub requested: Stamp,
    pub reviewed: Option<Stamp>,
    pub transaction_id: Option<String>,
}

impl Instrument for Investment {
    const KIND: &'static str = "investment";

    fn id(&self) -> InstrumentId {
        self.id
    }

    fn account_number(&self) -> &str {
        &self.account_number
    }
}

impl Approvable for Investment {
    const ON_APPROVAL: EntryType = EntryType::Debit;

    fn approval_status(&self) -> ApprovalStatus {
        self.status
    }

    fn amount(&self) -> Amount {
        self.amount
    }

    fn description(&self) -> String {
        format!("Investment {} ({})", self.id, self.kind)
    }

    fn review(&mut self, status: ApprovalStatus, stamp: Stamp, transaction_id: Option<String>) {
        self.status = status;
        self.reviewed = Some(stamp);
        self.transaction_id = transaction_id;
    }
}

impl Bank {
    pub fn request_investment(
        &self,
        account_number: &str,
        kind: InvestmentKind,
        amount: Amount,
        expected_return_rate: Decimal,
        tenure_months: u32,
        by: &str,
    ) -> Result<Investment> {
        let amount = validate_amount(amount)?;
        validate_rate(expected_return_rate)?;
        if tenure_months == 0 {
            return Err(BankError::validation("tenure must be at least one month"));
        }
        let projected_value = interest::maturity_amount(amount, expected_return_rate, tenure_months)?;
        let requested = Stamp::new(by, self.now());

        self.db.transaction(|tables| {
            ensure_account(tables, account_number)?;
            let investment = Investment {
                id: tables.investments.next_id(),
                account_number: account_number.to_string(),
                kind,
                amount,
                expected_return_rate,
                tenure_months,
                projected_value,
                status: ApprovalStatus::Pending,
                requested,
                reviewed: None,
                transaction_id: None,
            };
            tables.investments.insert(investment.id, investment.clone());

            Ok(investment)
        })
    }

    pub fn investment(&self, id: InstrumentId) -> Result<Investment> {
        self.db.read(|tables| tables.investments.find(id).cloned())
    }

    pub fn investments_for(&self, account_number: &str) -> Vec<Investment> {
        self.db
            .read(|tables| tables.investments.for_account(account_number).cloned().collect())
    }

    pub fn approve_investment(&self, id: InstrumentId, admin: &str) -> Result<Outcome<Investment>> {
        let stamp = Stamp::new(admin, self.now());
        self.db
            .transaction(|tables| approve(tables, |t| &mut t.investments, id, stamp))
    }

    pub fn reject_investment(&self, id: InstrumentId, admin: &str, reason: &str) -> Result<Investment> {
        let stamp = Stamp::new(admin, self.now()).with_note(reason);
        self.db
            .transaction(|tables| reject(tables, |t| &mut t.investments, id, stamp))
    }
}

#[cfg(test)]
mod tests {
    use super::InvestmentKind;
    use crate::bank::Bank;
    use crate::error::BankError;
    use crate::instruments::ApprovalStatus;
    use crate::ledger::account::AccountHolder;

    use rust_decimal_macros::dec;

    fn bank() -> Bank {
        let bank = Bank::default();
        bank.open_account("SB001", AccountHolder::new("Kavya"), dec!(10000)).unwrap();
        bank
    }

    #[test]
    fn test_projected_value() {
        let bank = bank();
        let investment = bank
            .request_investment("SB001", InvestmentKind::Bond, dec!(5000), dec!(8), 24, "kavya")
            .unwrap();
        assert_eq!(dec!(5832.00), investment.projected_value);
        assert_eq!(dec!(10000), bank.account("SB001").unwrap().balance());
    }

    #[test]
    fn test_approve_debits_once() {
        let bank = bank();
        let investment = bank
            .request_investment("SB001", InvestmentKind::MutualFund, dec!(4000), dec!(12), 12, "kavya")
            .unwrap();

        let outcome = bank.approve_investment(investment.id, "admin").unwrap();
        assert_eq!(ApprovalStatus::Approved, outcome.instrument.status);
        assert_eq!(dec!(-4000.00), outcome.entry.amount);
        assert_eq!(dec!(6000), bank.account("SB001").unwrap().balance());

        assert!(matches!(
            bank.approve_investment(investment.id, "admin"),
            Err(BankError::InvalidStateTransition { .. })
        ));
        assert_eq!(2, bank.history("SB001").unwrap().len());
        assert_eq!(1, bank.investments_for("SB001").len());
    }

    #[test]
    fn test_insufficient_funds_keeps_request_pending() {
        let bank = bank();
        let investment = bank
            .request_investment("SB001", InvestmentKind::Equity, dec!(20000), dec!(15), 36, "kavya")
            .unwrap();

        assert!(matches!(
            bank.approve_investment(investment.id, "admin"),
            Err(BankError::InsufficientFunds { .. })
        ));
        assert_eq!(ApprovalStatus::Pending, bank.investment(investment.id).unwrap().status);

        let rejected = bank.reject_investment(investment.id, "admin", "not funded").unwrap();
        assert_eq!(ApprovalStatus::Rejected, rejected.status);
        assert_eq!(dec!(10000), bank.account("SB001").unwrap().balance());
    }

    #[test]
    fn test_request_validation() {
        let bank = bank();
        for (rate, tenure) in vec![(dec!(-1), 12), (dec!(101), 12), (dec!(8), 0)] {
            assert!(matches!(
                bank.request_investment("SB001", InvestmentKind::Bond, dec!(100), rate, tenure, "x"),
                Err(BankError::ValidationFailed(_))
            ));
        }
        assert_eq!(Ok(InvestmentKind::MutualFund), "mutual_fund".parse());
    }
}

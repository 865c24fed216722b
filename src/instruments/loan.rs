//! Loans and their EMI payments.
//!
//! A loan is PENDING until reviewed. Approval disburses the principal and
//! generates one EMI payment per month of tenure; each EMI goes from Pending
//! to Paid on its own, and the loan becomes PAID with the last one.

use super::{ensure_account, validate_rate, Instrument, Outcome, Stamp};
use crate::bank::Bank;
use crate::error::{BankError, Result};
use crate::interest::{self, Installment};
use crate::ledger::journal::{self, EntryType};
use crate::ledger::{validate_amount, AccountNumber, Amount, InstrumentId};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanKind {
    Personal,
    Home,
    Vehicle,
    Education,
}

impl fmt::Display for LoanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanKind::Personal => write!(f, "personal"),
            LoanKind::Home => write!(f, "home"),
            LoanKind::Vehicle => write!(f, "vehicle"),
            LoanKind::Education => write!(f, "education"),
        }
    }
}

impl FromStr for LoanKind {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "personal" => Ok(LoanKind::Personal),
            "home" => Ok(LoanKind::Home),
            "vehicle" => Ok(LoanKind::Vehicle),
            "education" => Ok(LoanKind::Education),
            other => Err(BankError::validation(format!("unknown loan kind {:?}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanStatus::Pending => write!(f, "PENDING"),
            LoanStatus::Approved => write!(f, "APPROVED"),
            LoanStatus::Rejected => write!(f, "REJECTED"),
            LoanStatus::Paid => write!(f, "PAID"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmiStatus {
    Pending,
    Paid,
}

impl fmt::Display for EmiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmiStatus::Pending => write!(f, "Pending"),
            EmiStatus::Paid => write!(f, "Paid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Loan {
    pub id: InstrumentId,
    pub account_number: AccountNumber,
    pub kind: LoanKind,
    pub principal: Amount,
    pub interest_rate: Decimal,
    pub tenure_months: u32,
    pub emi_amount: Amount,
    pub status: LoanStatus,
    pub installments_total: u32,
    pub installments_paid: u32,
    pub applied_at: DateTime<Utc>,
    pub reviewed: Option<Stamp>,
    pub disbursement_transaction_id: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Instrument for Loan {
    const KIND: &'static str = "loan";

    fn id(&self) -> InstrumentId {
        self.id
    }

    fn account_number(&self) -> &str {
        &self.account_number
    }
}

impl Loan {
    fn ensure_status(&self, status: LoanStatus, operation: &'static str) -> Result<()> {
        if self.status != status {
            return Err(BankError::transition(Self::KIND, self.id, self.status, operation));
        }

        Ok(())
    }

    fn record_payment(&mut self, at: DateTime<Utc>) {
        self.installments_paid += 1;
        if self.installments_paid == self.installments_total {
            self.status = LoanStatus::Paid;
            self.closed_at = Some(at);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmiPayment {
    pub id: InstrumentId,
    pub loan_id: InstrumentId,
    pub account_number: AccountNumber,
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub principal_component: Amount,
    pub interest_component: Amount,
    pub total_amount: Amount,
    pub remaining_principal: Amount,
    pub status: EmiStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub balance_before: Option<Amount>,
    pub balance_after: Option<Amount>,
    pub transaction_id: Option<String>,
}

impl Instrument for EmiPayment {
    const KIND: &'static str = "emi payment";

    fn id(&self) -> InstrumentId {
        self.id
    }

    fn account_number(&self) -> &str {
        &self.account_number
    }
}

impl EmiPayment {
    fn from_installment(id: InstrumentId, loan: &Loan, installment: Installment) -> Self {
        Self {
            id,
            loan_id: loan.id,
            account_number: loan.account_number.clone(),
            installment_number: installment.number,
            due_date: installment.due_date,
            principal_component: installment.principal,
            interest_component: installment.interest,
            total_amount: installment.total,
            remaining_principal: installment.remaining_principal,
            status: EmiStatus::Pending,
            payment_date: None,
            balance_before: None,
            balance_after: None,
            transaction_id: None,
        }
    }
}

impl Bank {
    /// Apply for a loan. The rate defaults to the configured rate for `kind`.
    pub fn apply_for_loan(
        &self,
        account_number: &str,
        kind: LoanKind,
        principal: Amount,
        interest_rate: Option<Decimal>,
        tenure_months: u32,
    ) -> Result<Loan> {
        let principal = validate_amount(principal)?;
        let config = &self.config().loans;
        if tenure_months == 0 || tenure_months > config.max_tenure_months {
            return Err(BankError::validation(format!(
                "tenure must be between 1 and {} months",
                config.max_tenure_months
            )));
        }
        let interest_rate = interest_rate.unwrap_or_else(|| config.rate_for(kind));
        validate_rate(interest_rate)?;
        let emi_amount = interest::emi(principal, interest_rate, tenure_months)?;
        // Every installment has to move money, or the loan could never be paid off.
        let schedule = interest::amortization_schedule(principal, interest_rate, tenure_months, self.today())?;
        if emi_amount <= Amount::ZERO || schedule.iter().any(|installment| installment.total <= Amount::ZERO) {
            return Err(BankError::validation(format!(
                "principal {} is too small to repay over {} months",
                principal, tenure_months
            )));
        }
        let now = self.now();

        self.db.transaction(|tables| {
            ensure_account(tables, account_number)?;
            let loan = Loan {
                id: tables.loans.next_id(),
                account_number: account_number.to_string(),
                kind,
                principal,
                interest_rate,
                tenure_months,
                emi_amount,
                status: LoanStatus::Pending,
                installments_total: tenure_months,
                installments_paid: 0,
                applied_at: now,
                reviewed: None,
                disbursement_transaction_id: None,
                closed_at: None,
            };
            tables.loans.insert(loan.id, loan.clone());

            Ok(loan)
        })
    }

    pub fn loan(&self, id: InstrumentId) -> Result<Loan> {
        self.db.read(|tables| tables.loans.find(id).cloned())
    }

    pub fn emi_payment(&self, id: InstrumentId) -> Result<EmiPayment> {
        self.db.read(|tables| tables.emi_payments.find(id).cloned())
    }

    /// EMI payments of a loan, by installment number.
    pub fn loan_schedule(&self, loan_id: InstrumentId) -> Result<Vec<EmiPayment>> {
        self.db.read(|tables| {
            tables.loans.find(loan_id)?;
            let mut schedule: Vec<EmiPayment> = tables
                .emi_payments
                .values()
                .filter(|emi| emi.loan_id == loan_id)
                .cloned()
                .collect();
            schedule.sort_by_key(|emi| emi.installment_number);
            Ok(schedule)
        })
    }

    /// Principal not yet covered by a paid EMI.
    pub fn outstanding_principal(&self, loan_id: InstrumentId) -> Result<Amount> {
        self.db.read(|tables| {
            let loan = tables.loans.find(loan_id)?;
            let repaid: Amount = tables
                .emi_payments
                .values()
                .filter(|emi| emi.loan_id == loan_id && emi.status == EmiStatus::Paid)
                .map(|emi| emi.principal_component)
                .sum();

            Ok(match loan.status {
                LoanStatus::Approved | LoanStatus::Paid => loan.principal - repaid,
                LoanStatus::Pending | LoanStatus::Rejected => Amount::ZERO,
            })
        })
    }

    /// Approve a loan: disburse the principal and generate its EMI schedule,
    /// first installment due one month from today.
    pub fn approve_loan(&self, id: InstrumentId, admin: &str) -> Result<Outcome<Loan>> {
        let stamp = Stamp::new(admin, self.now());
        let today = stamp.at.date_naive();

        self.db.transaction(|tables| {
            let loan = tables.loans.find(id)?;
            loan.ensure_status(LoanStatus::Pending, "approve")?;
            let loan = loan.clone();
            let schedule = interest::amortization_schedule(
                loan.principal,
                loan.interest_rate,
                loan.tenure_months,
                today,
            )?;

            let entry = journal::post(
                tables,
                stamp.at,
                &loan.account_number,
                EntryType::Credit,
                loan.principal,
                &format!("{} loan {} disbursed", loan.kind, id),
            )?;
            for installment in schedule {
                let emi_id = tables.emi_payments.next_id();
                tables
                    .emi_payments
                    .insert(emi_id, EmiPayment::from_installment(emi_id, &loan, installment));
            }

            let loan = tables.loans.find_mut(id)?;
            loan.status = LoanStatus::Approved;
            loan.reviewed = Some(stamp);
            loan.disbursement_transaction_id = Some(entry.transaction_id.clone());
            tracing::info!(loan = id, account = %loan.account_number, principal = %loan.principal, "loan approved");

            Ok(Outcome {
                instrument: loan.clone(),
                entry,
            })
        })
    }

    pub fn reject_loan(&self, id: InstrumentId, admin: &str, reason: &str) -> Result<Loan> {
        let stamp = Stamp::new(admin, self.now()).with_note(reason);
        self.db.transaction(|tables| {
            let loan = tables.loans.find_mut(id)?;
            loan.ensure_status(LoanStatus::Pending, "reject")?;
            loan.status = LoanStatus::Rejected;
            loan.reviewed = Some(stamp);
            Ok(loan.clone())
        })
    }

    /// Pay one EMI from the borrower's account.
    pub fn pay_emi(&self, emi_id: InstrumentId) -> Result<Outcome<EmiPayment>> {
        let outcome = self.db.transaction(|tables| {
            let now = self.now();
            let emi = tables.emi_payments.find(emi_id)?;
            if emi.status != EmiStatus::Pending {
                return Err(BankError::transition(EmiPayment::KIND, emi_id, emi.status, "pay"));
            }
            let (loan_id, account_number, amount, number) = (
                emi.loan_id,
                emi.account_number.clone(),
                emi.total_amount,
                emi.installment_number,
            );
            tables.loans.find(loan_id)?.ensure_status(LoanStatus::Approved, "pay an EMI")?;
            let balance_before = tables
                .accounts
                .get(account_number.as_str())
                .map(|account| account.balance())
                .ok_or_else(|| BankError::AccountNotFound(account_number.clone()))?;

            let entry = journal::post(
                tables,
                now,
                &account_number,
                EntryType::Debit,
                amount,
                &format!("Loan {} EMI {}", loan_id, number),
            )?;

            let emi = tables.emi_payments.find_mut(emi_id)?;
            emi.status = EmiStatus::Paid;
            emi.payment_date = Some(now);
            emi.balance_before = Some(balance_before);
            emi.balance_after = Some(entry.balance);
            emi.transaction_id = Some(entry.transaction_id.clone());
            let emi = emi.clone();

            tables.loans.find_mut(loan_id)?.record_payment(now);

            Ok(Outcome {
                instrument: emi,
                entry,
            })
        });

        match &outcome {
            Ok(outcome) => tracing::info!(
                emi = emi_id,
                loan = outcome.instrument.loan_id,
                amount = %outcome.entry.amount,
                "EMI paid"
            ),
            Err(err) => tracing::warn!(emi = emi_id, error = %err, "EMI not paid"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::{EmiStatus, LoanKind, LoanStatus};
    use crate::bank::Bank;
    use crate::error::BankError;
    use crate::ledger::account::AccountHolder;

    use rust_decimal_macros::dec;

    fn bank() -> Bank {
        let bank = Bank::default();
        bank.open_account("SB001", AccountHolder::new("Imran"), dec!(20000)).unwrap();
        bank
    }

    #[test]
    fn test_loan_kind_from_str() {
        assert_eq!(Ok(LoanKind::Home), " Home ".parse());
        assert!("boat".parse::<LoanKind>().is_err());
    }

    #[test]
    fn test_apply() {
        let bank = bank();
        let loan = bank
            .apply_for_loan("SB001", LoanKind::Personal, dec!(120000), Some(dec!(12)), 12)
            .unwrap();
        assert_eq!(LoanStatus::Pending, loan.status);
        assert!((loan.emi_amount - dec!(10661.85)).abs() <= dec!(0.01));

        let loan = bank
            .apply_for_loan("SB001", LoanKind::Home, dec!(100000), None, 120)
            .unwrap();
        assert_eq!(dec!(8.5), loan.interest_rate);

        assert!(matches!(
            bank.apply_for_loan("SB001", LoanKind::Home, dec!(100000), None, 0),
            Err(BankError::ValidationFailed(_))
        ));
        assert_eq!(dec!(0), bank.outstanding_principal(loan.id).unwrap());
    }

    #[test]
    fn test_approve_generates_schedule() {
        let bank = bank();
        let loan = bank
            .apply_for_loan("SB001", LoanKind::Personal, dec!(120000), Some(dec!(12)), 12)
            .unwrap();

        let outcome = bank.approve_loan(loan.id, "admin").unwrap();
        assert_eq!(LoanStatus::Approved, outcome.instrument.status);
        assert_eq!(dec!(120000.00), outcome.entry.amount);
        assert_eq!(dec!(140000), bank.account("SB001").unwrap().balance());

        let schedule = bank.loan_schedule(loan.id).unwrap();
        assert_eq!(12, schedule.len());
        assert_eq!(
            dec!(120000),
            schedule.iter().map(|emi| emi.principal_component).sum::<rust_decimal::Decimal>()
        );
        assert_eq!(dec!(0), schedule[11].remaining_principal);
        assert_eq!(dec!(120000), bank.outstanding_principal(loan.id).unwrap());

        assert!(matches!(
            bank.approve_loan(loan.id, "admin"),
            Err(BankError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_pay_all_emis_closes_loan() {
        let bank = bank();
        let loan = bank
            .apply_for_loan("SB001", LoanKind::Vehicle, dec!(3000), Some(dec!(12)), 3)
            .unwrap();
        bank.approve_loan(loan.id, "admin").unwrap();
        let schedule = bank.loan_schedule(loan.id).unwrap();

        let first = bank.pay_emi(schedule[0].id).unwrap();
        assert_eq!(EmiStatus::Paid, first.instrument.status);
        assert_eq!(Some(dec!(23000)), first.instrument.balance_before);
        assert_eq!(Some(first.entry.balance), first.instrument.balance_after);
        assert_eq!(-schedule[0].total_amount, first.entry.amount);

        // Paying the same EMI again is refused and journals nothing.
        let entries = bank.history("SB001").unwrap().len();
        assert!(matches!(
            bank.pay_emi(schedule[0].id),
            Err(BankError::InvalidStateTransition { .. })
        ));
        assert_eq!(entries, bank.history("SB001").unwrap().len());

        // Installments can be paid in any order.
        bank.pay_emi(schedule[2].id).unwrap();
        assert_eq!(LoanStatus::Approved, bank.loan(loan.id).unwrap().status);
        bank.pay_emi(schedule[1].id).unwrap();

        let loan = bank.loan(loan.id).unwrap();
        assert_eq!(LoanStatus::Paid, loan.status);
        assert_eq!(3, loan.installments_paid);
        assert!(loan.closed_at.is_some());
        assert_eq!(dec!(0), bank.outstanding_principal(loan.id).unwrap());

        let total: rust_decimal::Decimal = schedule.iter().map(|emi| emi.total_amount).sum();
        assert_eq!(dec!(23000) - total, bank.account("SB001").unwrap().balance());
    }

    #[test]
    // 0.10 over 12 months at 0% would leave the last installments at 0.00.
    fn test_loan_too_small_to_repay_is_refused() {
        let bank = bank();
        for (principal, rate, tenure) in vec![
            (dec!(0.10), dec!(0), 12),
            (dec!(0.01), dec!(12), 2),
            (dec!(1), dec!(0), 360),
        ] {
            assert!(matches!(
                bank.apply_for_loan("SB001", LoanKind::Personal, principal, Some(rate), tenure),
                Err(BankError::ValidationFailed(_))
            ));
        }

        let loan = bank
            .apply_for_loan("SB001", LoanKind::Personal, dec!(0.12), Some(dec!(0)), 12)
            .unwrap();
        bank.approve_loan(loan.id, "admin").unwrap();
        for emi in bank.loan_schedule(loan.id).unwrap() {
            assert!(emi.total_amount > dec!(0));
            bank.pay_emi(emi.id).unwrap();
        }
        assert_eq!(LoanStatus::Paid, bank.loan(loan.id).unwrap().status);
        assert_eq!(dec!(0), bank.outstanding_principal(loan.id).unwrap());
    }

    #[test]
    fn test_pay_emi_insufficient_funds_is_retryable() {
        let bank = Bank::default();
        bank.open_account("SB002", AccountHolder::new("Nisha"), dec!(0)).unwrap();
        let loan = bank
            .apply_for_loan("SB002", LoanKind::Personal, dec!(1200), Some(dec!(0)), 12)
            .unwrap();
        bank.approve_loan(loan.id, "admin").unwrap();
        bank.debit("SB002", dec!(1150), "spent").unwrap();

        let schedule = bank.loan_schedule(loan.id).unwrap();
        assert!(matches!(
            bank.pay_emi(schedule[0].id),
            Err(BankError::InsufficientFunds { .. })
        ));
        assert_eq!(EmiStatus::Pending, bank.emi_payment(schedule[0].id).unwrap().status);

        bank.credit("SB002", dec!(50), "topup").unwrap();
        assert!(bank.pay_emi(schedule[0].id).is_ok());
    }

    #[test]
    fn test_reject() {
        let bank = bank();
        let loan = bank
            .apply_for_loan("SB001", LoanKind::Education, dec!(50000), None, 24)
            .unwrap();
        let rejected = bank.reject_loan(loan.id, "admin", "income proof missing").unwrap();
        assert_eq!(LoanStatus::Rejected, rejected.status);
        assert!(bank.loan_schedule(loan.id).unwrap().is_empty());
        assert!(bank.approve_loan(loan.id, "admin").is_err());
        assert_eq!(dec!(20000), bank.account("SB001").unwrap().balance());
    }
}

//! Fixed deposits.
//!
//! ```text
//! status:            PENDING --approve--> ACTIVE --process_maturity--> MATURED
//!                    PENDING --reject---> REJECTED
//!                    ACTIVE  --full withdrawal--> CLOSED
//! withdrawal_status: NONE/PROCESSED/REJECTED --request--> PENDING --process--> PROCESSED
//!                                                         PENDING --reject---> REJECTED
//! ```
//!
//! While ACTIVE, interest is paid out once per calendar month without
//! changing the status.

use super::{ensure_account, validate_rate, Instrument, Outcome, Stamp};
use crate::bank::Bank;
use crate::error::{BankError, Result};
use crate::interest;
use crate::ledger::journal::{self, EntryType, Transaction};
use crate::ledger::{validate_amount, AccountNumber, Amount, InstrumentId};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixedDepositStatus {
    Pending,
    Active,
    Matured,
    Rejected,
    Closed,
}

impl fmt::Display for FixedDepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixedDepositStatus::Pending => write!(f, "PENDING"),
            FixedDepositStatus::Active => write!(f, "ACTIVE"),
            FixedDepositStatus::Matured => write!(f, "MATURED"),
            FixedDepositStatus::Rejected => write!(f, "REJECTED"),
            FixedDepositStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    None,
    Pending,
    Processed,
    Rejected,
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalStatus::None => write!(f, "NONE"),
            WithdrawalStatus::Pending => write!(f, "PENDING"),
            WithdrawalStatus::Processed => write!(f, "PROCESSED"),
            WithdrawalStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixedDeposit {
    pub id: InstrumentId,
    pub account_number: AccountNumber,
    pub principal: Amount,
    pub interest_rate: Decimal,
    pub tenure_months: u32,
    pub maturity_amount: Amount,
    pub status: FixedDepositStatus,
    pub withdrawal_status: WithdrawalStatus,
    pub withdrawal_amount: Option<Amount>,
    pub start_date: Option<NaiveDate>,
    pub maturity_date: Option<NaiveDate>,
    pub last_interest_credit_date: Option<NaiveDate>,
    pub months_interest_credited: u32,
    pub total_interest_credited: Amount,
    pub is_matured: bool,
    pub created_at: DateTime<Utc>,
    pub reviewed: Option<Stamp>,
    pub withdrawal_requested: Option<Stamp>,
    pub withdrawal_reviewed: Option<Stamp>,
    pub last_action: Option<Stamp>,
}

impl Instrument for FixedDeposit {
    const KIND: &'static str = "fixed deposit";

    fn id(&self) -> InstrumentId {
        self.id
    }

    fn account_number(&self) -> &str {
        &self.account_number
    }
}

impl FixedDeposit {
    fn refuse(&self, operation: &'static str) -> BankError {
        BankError::transition(Self::KIND, self.id, self.status, operation)
    }

    fn ensure_status(&self, status: FixedDepositStatus, operation: &'static str) -> Result<()> {
        if self.status != status {
            return Err(self.refuse(operation));
        }

        Ok(())
    }

    /// True once the maturity date is reached.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.maturity_date.map_or(false, |date| date <= today)
    }

    fn activate(&mut self, today: NaiveDate, stamp: Stamp) -> Result<()> {
        self.start_date = Some(today);
        self.maturity_date = Some(interest::add_months(today, self.tenure_months)?);
        self.status = FixedDepositStatus::Active;
        self.reviewed = Some(stamp.clone());
        self.last_action = Some(stamp);

        Ok(())
    }

    /// The interest to pay this month, if it is still owed.
    fn interest_due(&self, today: NaiveDate) -> Result<Amount> {
        self.ensure_status(FixedDepositStatus::Active, "credit interest")?;
        if self.is_due(today) {
            return Err(BankError::transition(
                Self::KIND,
                self.id,
                "past maturity",
                "credit interest",
            ));
        }
        if let Some(last) = self.last_interest_credit_date {
            if (last.year(), last.month()) == (today.year(), today.month()) {
                return Err(BankError::AlreadyProcessed(format!(
                    "interest for {}-{:02} already credited to fixed deposit {}",
                    today.year(),
                    today.month(),
                    self.id
                )));
            }
        }

        Ok(interest::monthly_simple_interest(self.principal, self.interest_rate))
    }

    fn record_interest(&mut self, amount: Amount, today: NaiveDate, stamp: Stamp) {
        self.last_interest_credit_date = Some(today);
        self.months_interest_credited += 1;
        self.total_interest_credited += amount;
        self.last_action = Some(stamp);
    }

    fn maturity_due(&self, today: NaiveDate) -> Result<Amount> {
        self.ensure_status(FixedDepositStatus::Active, "process maturity")?;
        if !self.is_due(today) {
            return Err(BankError::transition(
                Self::KIND,
                self.id,
                "not yet due",
                "process maturity",
            ));
        }

        Ok(self.maturity_amount)
    }

    fn mark_matured(&mut self, stamp: Stamp) {
        self.status = FixedDepositStatus::Matured;
        self.is_matured = true;
        self.last_action = Some(stamp);
    }

    fn request_withdrawal(&mut self, amount: Amount, stamp: Stamp) -> Result<()> {
        self.ensure_status(FixedDepositStatus::Active, "request a withdrawal")?;
        if self.withdrawal_status == WithdrawalStatus::Pending {
            return Err(BankError::transition(
                Self::KIND,
                self.id,
                "withdrawal PENDING",
                "request a withdrawal",
            ));
        }
        let amount = validate_amount(amount)?;
        if amount > self.principal {
            return Err(BankError::validation(format!(
                "withdrawal of {} exceeds the deposit principal {}",
                amount, self.principal
            )));
        }

        self.withdrawal_status = WithdrawalStatus::Pending;
        self.withdrawal_amount = Some(amount);
        self.withdrawal_requested = Some(stamp.clone());
        self.withdrawal_reviewed = None;
        self.last_action = Some(stamp);

        Ok(())
    }

    fn pending_withdrawal(&self, operation: &'static str) -> Result<Amount> {
        self.ensure_status(FixedDepositStatus::Active, operation)?;
        match (self.withdrawal_status, self.withdrawal_amount) {
            (WithdrawalStatus::Pending, Some(amount)) => Ok(amount),
            (status, _) => Err(BankError::transition(
                Self::KIND,
                self.id,
                format!("withdrawal {}", status),
                operation,
            )),
        }
    }

    fn apply_withdrawal(&mut self, amount: Amount, stamp: Stamp) -> Result<()> {
        self.principal -= amount;
        self.maturity_amount =
            interest::maturity_amount(self.principal, self.interest_rate, self.tenure_months)?;
        self.withdrawal_status = WithdrawalStatus::Processed;
        self.withdrawal_reviewed = Some(stamp.clone());
        self.last_action = Some(stamp);
        if self.principal.is_zero() {
            self.status = FixedDepositStatus::Closed;
        }

        Ok(())
    }
}

impl Bank {
    /// Book a fixed deposit. It stays PENDING, and no money moves, until it
    /// is approved.
    pub fn open_fixed_deposit(
        &self,
        account_number: &str,
        principal: Amount,
        interest_rate: Option<Decimal>,
        tenure_months: u32,
    ) -> Result<FixedDeposit> {
        let config = &self.config().fixed_deposit;
        let principal = validate_amount(principal)?;
        if principal < config.minimum_principal {
            return Err(BankError::validation(format!(
                "fixed deposits start at {}",
                config.minimum_principal
            )));
        }
        if !(config.min_tenure_months..=config.max_tenure_months).contains(&tenure_months) {
            return Err(BankError::validation(format!(
                "tenure must be between {} and {} months",
                config.min_tenure_months, config.max_tenure_months
            )));
        }
        let interest_rate = interest_rate.unwrap_or(config.default_rate);
        validate_rate(interest_rate)?;
        if interest::monthly_simple_interest(principal, interest_rate) <= Amount::ZERO {
            return Err(BankError::validation(format!(
                "a fixed deposit of {} at {}% earns no monthly interest",
                principal, interest_rate
            )));
        }
        let maturity_amount = interest::maturity_amount(principal, interest_rate, tenure_months)?;
        let now = self.now();

        self.db.transaction(|tables| {
            ensure_account(tables, account_number)?;
            let deposit = FixedDeposit {
                id: tables.fixed_deposits.next_id(),
                account_number: account_number.to_string(),
                principal,
                interest_rate,
                tenure_months,
                maturity_amount,
                status: FixedDepositStatus::Pending,
                withdrawal_status: WithdrawalStatus::None,
                withdrawal_amount: None,
                start_date: None,
                maturity_date: None,
                last_interest_credit_date: None,
                months_interest_credited: 0,
                total_interest_credited: Amount::ZERO,
                is_matured: false,
                created_at: now,
                reviewed: None,
                withdrawal_requested: None,
                withdrawal_reviewed: None,
                last_action: None,
            };
            tables.fixed_deposits.insert(deposit.id, deposit.clone());

            Ok(deposit)
        })
    }

    pub fn fixed_deposit(&self, id: InstrumentId) -> Result<FixedDeposit> {
        self.db.read(|tables| tables.fixed_deposits.find(id).cloned())
    }

    pub fn fixed_deposits(&self) -> Vec<FixedDeposit> {
        self.db
            .read(|tables| tables.fixed_deposits.values().cloned().collect())
    }

    /// Activate the deposit: the principal leaves the account and the term
    /// starts today.
    pub fn approve_fixed_deposit(&self, id: InstrumentId, admin: &str) -> Result<Outcome<FixedDeposit>> {
        let stamp = Stamp::new(admin, self.now());
        let today = stamp.at.date_naive();

        self.db.transaction(|tables| {
            let deposit = tables.fixed_deposits.find(id)?;
            deposit.ensure_status(FixedDepositStatus::Pending, "approve")?;
            let (account_number, principal) = (deposit.account_number.clone(), deposit.principal);

            let entry = journal::post(
                tables,
                stamp.at,
                &account_number,
                EntryType::Debit,
                principal,
                &format!("Fixed deposit {} opened", id),
            )?;
            let deposit = tables.fixed_deposits.find_mut(id)?;
            deposit.activate(today, stamp)?;
            tracing::info!(fixed_deposit = id, account = %account_number, %principal, "fixed deposit activated");

            Ok(Outcome {
                instrument: deposit.clone(),
                entry,
            })
        })
    }

    pub fn reject_fixed_deposit(&self, id: InstrumentId, admin: &str, reason: &str) -> Result<FixedDeposit> {
        let stamp = Stamp::new(admin, self.now()).with_note(reason);
        self.db.transaction(|tables| {
            let deposit = tables.fixed_deposits.find_mut(id)?;
            deposit.ensure_status(FixedDepositStatus::Pending, "reject")?;
            deposit.status = FixedDepositStatus::Rejected;
            deposit.reviewed = Some(stamp.clone());
            deposit.last_action = Some(stamp);
            Ok(deposit.clone())
        })
    }

    /// Pay this month's interest on an active deposit.
    pub fn credit_fixed_deposit_interest(&self, id: InstrumentId) -> Result<Outcome<FixedDeposit>> {
        self.credit_fixed_deposit_interest_at(id, self.now())
    }

    pub(crate) fn credit_fixed_deposit_interest_at(
        &self,
        id: InstrumentId,
        now: DateTime<Utc>,
    ) -> Result<Outcome<FixedDeposit>> {
        let today = now.date_naive();
        self.db.transaction(|tables| {
            let deposit = tables.fixed_deposits.find(id)?;
            let amount = deposit.interest_due(today)?;
            let account_number = deposit.account_number.clone();

            let entry = journal::post(
                tables,
                now,
                &account_number,
                EntryType::Credit,
                amount,
                &format!("Fixed deposit {} interest {}", id, today.format("%Y-%m")),
            )?;
            let deposit = tables.fixed_deposits.find_mut(id)?;
            deposit.record_interest(amount, today, Stamp::new("scheduler", now));
            tracing::info!(fixed_deposit = id, account = %account_number, %amount, "interest credited");

            Ok(Outcome {
                instrument: deposit.clone(),
                entry,
            })
        })
    }

    /// Pay out the maturity amount of a deposit that reached its term.
    pub fn process_maturity(&self, id: InstrumentId) -> Result<Outcome<FixedDeposit>> {
        self.process_maturity_at(id, self.now())
    }

    pub(crate) fn process_maturity_at(
        &self,
        id: InstrumentId,
        now: DateTime<Utc>,
    ) -> Result<Outcome<FixedDeposit>> {
        self.db.transaction(|tables| {
            let deposit = tables.fixed_deposits.find(id)?;
            let amount = deposit.maturity_due(now.date_naive())?;
            let account_number = deposit.account_number.clone();

            let entry = journal::post(
                tables,
                now,
                &account_number,
                EntryType::Credit,
                amount,
                &format!("Fixed deposit {} matured", id),
            )?;
            let deposit = tables.fixed_deposits.find_mut(id)?;
            deposit.mark_matured(Stamp::new("system", now));
            tracing::info!(fixed_deposit = id, account = %account_number, %amount, "fixed deposit matured");

            Ok(Outcome {
                instrument: deposit.clone(),
                entry,
            })
        })
    }

    pub fn request_fixed_deposit_withdrawal(
        &self,
        id: InstrumentId,
        amount: Amount,
        requested_by: &str,
    ) -> Result<FixedDeposit> {
        let stamp = Stamp::new(requested_by, self.now());
        self.db.transaction(|tables| {
            let deposit = tables.fixed_deposits.find_mut(id)?;
            deposit.request_withdrawal(amount, stamp)?;
            Ok(deposit.clone())
        })
    }

    /// Pay a pending withdrawal back to the account. Taking the whole
    /// principal closes the deposit.
    pub fn process_fixed_deposit_withdrawal(
        &self,
        id: InstrumentId,
        admin: &str,
    ) -> Result<Outcome<FixedDeposit>> {
        let stamp = Stamp::new(admin, self.now());
        self.db.transaction(|tables| {
            let deposit = tables.fixed_deposits.find(id)?;
            let amount = deposit.pending_withdrawal("process the withdrawal")?;
            let account_number = deposit.account_number.clone();

            let entry: Transaction = journal::post(
                tables,
                stamp.at,
                &account_number,
                EntryType::Credit,
                amount,
                &format!("Fixed deposit {} withdrawal", id),
            )?;
            let deposit = tables.fixed_deposits.find_mut(id)?;
            deposit.apply_withdrawal(amount, stamp)?;
            tracing::info!(fixed_deposit = id, account = %account_number, %amount, status = %deposit.status, "withdrawal processed");

            Ok(Outcome {
                instrument: deposit.clone(),
                entry,
            })
        })
    }

    pub fn reject_fixed_deposit_withdrawal(
        &self,
        id: InstrumentId,
        admin: &str,
        reason: &str,
    ) -> Result<FixedDeposit> {
        let stamp = Stamp::new(admin, self.now()).with_note(reason);
        self.db.transaction(|tables| {
            let deposit = tables.fixed_deposits.find_mut(id)?;
            deposit.pending_withdrawal("reject the withdrawal")?;
            deposit.withdrawal_status = WithdrawalStatus::Rejected;
            deposit.withdrawal_reviewed = Some(stamp.clone());
            deposit.last_action = Some(stamp);
            Ok(deposit.clone())
        })
    }
}

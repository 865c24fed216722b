//! Financial instruments and their state machines.
//!
//! Every instrument belongs to one account and owns a status. Transitions
//! check the status (and any second status axis) before touching money, and
//! the money-moving ones leave the instrument in a status from which the same
//! transition is refused, so nothing is ever paid twice.

pub mod cheque;
pub mod deposit_request;
pub mod fixed_deposit;
pub mod gold_loan;
pub mod investment;
pub mod loan;
pub mod subsidy;

use crate::error::{BankError, Result};
use crate::ledger::journal::{self, EntryType, Transaction};
use crate::ledger::{Amount, InstrumentId};
use crate::store::{Table, Tables};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait Instrument {
    /// Used in error messages and logs, e.g. "cheque".
    const KIND: &'static str;

    fn id(&self) -> InstrumentId;
    fn account_number(&self) -> &str;
}

/// Who did something, and when.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stamp {
    pub by: String,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

impl Stamp {
    pub fn new(by: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            by: by.into(),
            at,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// What a money-moving transition returns: the instrument as persisted and
/// the journal entry it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub instrument: T,
    pub entry: Transaction,
}

/// The canonical request → review lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "PENDING"),
            ApprovalStatus::Approved => write!(f, "APPROVED"),
            ApprovalStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Instruments following the canonical lifecycle, where approval moves
/// exactly one amount in one direction and rejection moves nothing.
pub trait Approvable: Instrument + Clone {
    /// Direction of the money movement on approval, from the account's side.
    const ON_APPROVAL: EntryType;

    fn approval_status(&self) -> ApprovalStatus;
    fn amount(&self) -> Amount;
    fn description(&self) -> String;
    fn review(&mut self, status: ApprovalStatus, stamp: Stamp, transaction_id: Option<String>);

    fn ensure_pending(&self, operation: &'static str) -> Result<()> {
        match self.approval_status() {
            ApprovalStatus::Pending => Ok(()),
            status => Err(BankError::transition(Self::KIND, self.id(), status, operation)),
        }
    }
}

/// Approve a pending request: move its amount, journal it, mark it approved.
pub(crate) fn approve<T: Approvable>(
    tables: &mut Tables,
    table: fn(&mut Tables) -> &mut Table<InstrumentId, T>,
    id: InstrumentId,
    stamp: Stamp,
) -> Result<Outcome<T>> {
    let pending = table(tables).find(id)?.clone();
    pending.ensure_pending("approve")?;

    let entry = journal::post(
        tables,
        stamp.at,
        pending.account_number(),
        T::ON_APPROVAL,
        pending.amount(),
        &pending.description(),
    )?;

    let row = table(tables).find_mut(id)?;
    row.review(ApprovalStatus::Approved, stamp, Some(entry.transaction_id.clone()));
    tracing::info!(
        instrument = T::KIND,
        id,
        account = %entry.account_number,
        amount = %entry.amount,
        "request approved"
    );

    Ok(Outcome {
        instrument: row.clone(),
        entry,
    })
}

/// Reject a pending request. No money moves.
pub(crate) fn reject<T: Approvable>(
    tables: &mut Tables,
    table: fn(&mut Tables) -> &mut Table<InstrumentId, T>,
    id: InstrumentId,
    stamp: Stamp,
) -> Result<T> {
    let row = table(tables).find_mut(id)?;
    row.ensure_pending("reject")?;
    row.review(ApprovalStatus::Rejected, stamp, None);
    tracing::info!(instrument = T::KIND, id, "request rejected");

    Ok(row.clone())
}

/// Fail with `AccountNotFound` unless the account exists.
pub(crate) fn ensure_account(tables: &Tables, account_number: &str) -> Result<()> {
    if !tables.accounts.contains(account_number) {
        return Err(BankError::AccountNotFound(account_number.to_string()));
    }

    Ok(())
}

/// Annual rates are percentages and cannot be negative.
pub(crate) fn validate_rate(rate: rust_decimal::Decimal) -> Result<()> {
    if rate < rust_decimal::Decimal::ZERO {
        return Err(BankError::validation(format!("interest rate {} is negative", rate)));
    }
    if rate > rust_decimal_macros::dec!(100) {
        return Err(BankError::validation(format!("interest rate {} is above 100%", rate)));
    }

    Ok(())
}

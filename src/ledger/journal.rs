use super::{AccountNumber, Amount};
use crate::error::{BankError, Result};
use crate::store::Tables;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Credit, // Money added to the account.
    Debit,  // Money removed from the account.
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Credit => write!(f, "Credit"),
            EntryType::Debit => write!(f, "Debit"),
        }
    }
}

/// There is no multi-phase commit: an entry exists once it is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Completed,
}

/// One journal entry.
///
/// `amount` is signed (negative for debits) and `balance` is the balance the
/// account had right after this entry was applied. Entries are never updated:
/// a correction is a new, offsetting entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: u64,
    pub transaction_id: String,
    pub account_number: AccountNumber,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub balance: Amount,
    pub status: EntryStatus,
}

/// The append-only list of entries.
///
/// Appends done by a unit of work that gets rolled back are truncated away,
/// nothing else can remove an entry.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<Transaction>,
    uncommitted: usize,
}

impl Journal {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Transaction] {
        &self.entries
    }

    /// Entries of one account, in the order they were committed.
    pub fn for_account<'a>(
        &'a self,
        account_number: &'a str,
    ) -> impl Iterator<Item = &'a Transaction> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.account_number == account_number)
    }

    /// Timestamp for the next entry: `now`, or the last entry's timestamp if
    /// the clock reads earlier. Ordering by (timestamp, id) is commit order.
    fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.entries.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        }
    }

    fn append(&mut self, entry: Transaction) {
        self.entries.push(entry);
        self.uncommitted += 1;
    }

    pub(crate) fn commit(&mut self) {
        self.uncommitted = 0;
    }

    pub(crate) fn rollback(&mut self) {
        let keep = self.entries.len() - self.uncommitted;
        self.entries.truncate(keep);
        self.uncommitted = 0;
    }
}

/// Human readable identifier printed on statements, e.g. `TXN3F2A9C01B7E4`.
fn transaction_identifier() -> String {
    let uuid = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TXN{}", &uuid[..12])
}

/// Append an entry for a balance change the ledger just applied.
///
/// `resulting_balance` must be what the ledger returned: it is the snapshot
/// that makes the journal replayable.
pub(crate) fn record(
    tables: &mut Tables,
    now: DateTime<Utc>,
    account_number: &str,
    amount: Amount,
    entry_type: EntryType,
    description: &str,
    resulting_balance: Amount,
) -> Result<Transaction> {
    let account = tables
        .accounts
        .get(account_number)
        .ok_or_else(|| BankError::AccountNotFound(account_number.to_string()))?;
    debug_assert_eq!(account.balance(), resulting_balance);

    let amount = super::validate_amount(amount)?;
    let timestamp = tables.journal.next_timestamp(now);
    let entry = Transaction {
        id: tables.journal.len() as u64 + 1,
        transaction_id: transaction_identifier(),
        account_number: account_number.to_string(),
        entry_type,
        amount: match entry_type {
            EntryType::Credit => amount,
            EntryType::Debit => -amount,
        },
        description: description.to_string(),
        timestamp,
        balance: resulting_balance,
        status: EntryStatus::Completed,
    };
    tables.journal.append(entry.clone());

    Ok(entry)
}

/// Move money and journal it: the one path every instrument uses.
pub(crate) fn post(
    tables: &mut Tables,
    now: DateTime<Utc>,
    account_number: &str,
    entry_type: EntryType,
    amount: Amount,
    description: &str,
) -> Result<Transaction> {
    let amount = super::validate_amount(amount)?;
    let balance = match entry_type {
        EntryType::Credit => super::credit(&mut tables.accounts, account_number, amount)?,
        EntryType::Debit => super::debit(&mut tables.accounts, account_number, amount)?,
    };

    record(
        tables,
        now,
        account_number,
        amount,
        entry_type,
        description,
        balance,
    )
}

/// Sum the signed amounts of `entries` onto `opening`.
pub fn replay<'a>(opening: Amount, entries: impl IntoIterator<Item = &'a Transaction>) -> Amount {
    entries
        .into_iter()
        .fold(opening, |balance, entry| balance + entry.amount)
}

//! The bank: the store, the configuration and the clock, and the account
//! operations every other module builds on.
//!
//! Instrument operations are implemented next to their instrument, as more
//! `impl Bank` blocks.

use crate::clock::{Clock, SystemClock};
use crate::config::BankConfig;
use crate::error::{BankError, Result};
use crate::ledger::account::{Account, AccountHolder, AccountStatus};
use crate::ledger::journal::{self, EntryType, Transaction};
use crate::ledger::Amount;
use crate::store::Database;

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

pub struct Bank {
    pub(crate) db: Database,
    config: BankConfig,
    clock: Arc<dyn Clock>,
}

impl Default for Bank {
    fn default() -> Self {
        Self::new(BankConfig::default())
    }
}

impl Bank {
    pub fn new(config: BankConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: BankConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Database::default(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Open an account. A positive opening balance is posted as a journaled
    /// credit, so the journal always replays from zero.
    pub fn open_account(
        &self,
        account_number: &str,
        holder: AccountHolder,
        opening_balance: Amount,
    ) -> Result<Account> {
        let account_number = account_number.trim();
        if account_number.is_empty() {
            return Err(BankError::validation("account number is empty"));
        }
        holder.validate()?;
        if opening_balance < Amount::ZERO {
            return Err(BankError::InvalidAmount(opening_balance));
        }

        let account = self.db.transaction(|tables| {
            let now = self.now();
            if tables.accounts.contains(account_number) {
                return Err(BankError::DuplicateAccount(account_number.to_string()));
            }
            tables.accounts.insert(
                account_number.to_string(),
                Account::new(account_number.to_string(), holder, now),
            );
            if !opening_balance.is_zero() {
                journal::post(
                    tables,
                    now,
                    account_number,
                    EntryType::Credit,
                    opening_balance,
                    "Opening balance",
                )?;
            }

            tables
                .accounts
                .get(account_number)
                .cloned()
                .ok_or_else(|| BankError::AccountNotFound(account_number.to_string()))
        })?;

        tracing::info!(account = %account.account_number, balance = %account.balance(), "account opened");
        Ok(account)
    }

    /// Look an account up by its number.
    pub fn account(&self, account_number: &str) -> Result<Account> {
        self.db.read(|tables| {
            tables
                .accounts
                .get(account_number)
                .cloned()
                .ok_or_else(|| BankError::AccountNotFound(account_number.to_string()))
        })
    }

    pub fn find_by_pan(&self, pan: &str) -> Option<Account> {
        self.db.read(|tables| {
            tables
                .accounts
                .values()
                .find(|account| account.holder.pan.as_deref() == Some(pan))
                .cloned()
        })
    }

    pub fn find_by_aadhar(&self, aadhar: &str) -> Option<Account> {
        self.db.read(|tables| {
            tables
                .accounts
                .values()
                .find(|account| account.holder.aadhar.as_deref() == Some(aadhar))
                .cloned()
        })
    }

    /// All accounts, ordered by account number.
    pub fn accounts(&self) -> Vec<Account> {
        self.db.read(|tables| tables.accounts.values().cloned().collect())
    }

    /// Freeze, close or reactivate an account. The balance is left untouched.
    pub fn set_account_status(&self, account_number: &str, status: AccountStatus) -> Result<Account> {
        let account = self.db.transaction(|tables| {
            let account = tables
                .accounts
                .get_mut(account_number)
                .ok_or_else(|| BankError::AccountNotFound(account_number.to_string()))?;
            account.status = status;
            Ok(account.clone())
        })?;

        tracing::info!(account = %account_number, %status, "account status changed");
        Ok(account)
    }

    /// Credit an account and journal it, as one atomic unit.
    pub fn credit(&self, account_number: &str, amount: Amount, description: &str) -> Result<Transaction> {
        self.post(account_number, EntryType::Credit, amount, description)
    }

    /// Debit an account and journal it, as one atomic unit. Fails with
    /// `InsufficientFunds` rather than letting the balance go negative.
    pub fn debit(&self, account_number: &str, amount: Amount, description: &str) -> Result<Transaction> {
        self.post(account_number, EntryType::Debit, amount, description)
    }

    fn post(
        &self,
        account_number: &str,
        entry_type: EntryType,
        amount: Amount,
        description: &str,
    ) -> Result<Transaction> {
        let entry = self.db.transaction(|tables| {
            journal::post(tables, self.now(), account_number, entry_type, amount, description)
        })?;

        tracing::info!(
            account = %account_number,
            %entry_type,
            amount = %entry.amount,
            balance = %entry.balance,
            "balance changed"
        );
        Ok(entry)
    }

    /// Journal entries of an account, ordered by (timestamp, id). Timestamps
    /// never go backwards across commits, so this is also the order the
    /// balance snapshots chain in.
    pub fn history(&self, account_number: &str) -> Result<Vec<Transaction>> {
        let mut entries: Vec<Transaction> = self.db.read(|tables| {
            if !tables.accounts.contains(account_number) {
                return Err(BankError::AccountNotFound(account_number.to_string()));
            }

            Ok(tables.journal.for_account(account_number).cloned().collect())
        })?;
        entries.sort_by_key(|entry| (entry.timestamp, entry.id));

        Ok(entries)
    }

    /// The whole journal, in commit order.
    pub fn journal(&self) -> Vec<Transaction> {
        self.db.read(|tables| tables.journal.entries().to_vec())
    }
}

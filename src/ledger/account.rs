mod balance;
mod credit;
mod debit;

pub use balance::Balance;

use super::{AccountNumber, Amount};
use crate::error::{BankError, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    /// Temporarily blocked, e.g. by compliance. Balance is kept but frozen.
    Frozen,
    /// Archived. Accounts are never deleted.
    Closed,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "ACTIVE"),
            AccountStatus::Frozen => write!(f, "FROZEN"),
            AccountStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Identity fields. Only used as lookup keys, the ledger never reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHolder {
    pub name: String,
    pub pan: Option<String>,
    pub aadhar: Option<String>,
}

impl AccountHolder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pan: None,
            aadhar: None,
        }
    }

    pub fn with_pan(mut self, pan: impl Into<String>) -> Self {
        self.pan = Some(pan.into());
        self
    }

    pub fn with_aadhar(mut self, aadhar: impl Into<String>) -> Self {
        self.aadhar = Some(aadhar.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BankError::validation("account holder name is empty"));
        }
        if let Some(pan) = &self.pan {
            validate_pan(pan)?;
        }
        if let Some(aadhar) = &self.aadhar {
            validate_aadhar(aadhar)?;
        }

        Ok(())
    }
}

/// PAN: five letters, four digits, one letter (e.g. `ABCDE1234F`).
pub fn validate_pan(pan: &str) -> Result<()> {
    let bytes = pan.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes[..5].iter().all(u8::is_ascii_uppercase)
        && bytes[5..9].iter().all(u8::is_ascii_digit)
        && bytes[9].is_ascii_uppercase();

    if !well_formed {
        return Err(BankError::validation(format!("malformed PAN {:?}", pan)));
    }

    Ok(())
}

/// Aadhar: twelve digits, never starting with 0 or 1.
pub fn validate_aadhar(aadhar: &str) -> Result<()> {
    let well_formed = aadhar.len() == 12
        && aadhar.bytes().all(|b| b.is_ascii_digit())
        && !aadhar.starts_with(['0', '1']);

    if !well_formed {
        return Err(BankError::validation(format!(
            "malformed Aadhar number {:?}",
            aadhar
        )));
    }

    Ok(())
}

/// A customer account.
///
/// The balance can only be changed through `apply_credit` and `apply_debit`,
/// which are private to the ledger. Every other component reads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub account_number: AccountNumber,
    pub holder: AccountHolder,
    pub(crate) status: AccountStatus,
    balance: Balance,
    pub opened_at: DateTime<Utc>,
}

impl Account {
    pub(crate) fn new(
        account_number: AccountNumber,
        holder: AccountHolder,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            account_number,
            holder,
            status: AccountStatus::Active,
            balance: Balance::zero(),
            opened_at,
        }
    }

    pub fn balance(&self) -> Amount {
        self.balance.amount()
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    fn ensure_active(&self) -> Result<()> {
        match self.status {
            AccountStatus::Active => Ok(()),
            status => Err(BankError::AccountInactive {
                account: self.account_number.clone(),
                status: status.to_string(),
            }),
        }
    }
}

use super::{approve, ensure_account, reject, Approvable, ApprovalStatus, Instrument, Outcome, Stamp};
use crate::bank::Bank;
use crate::error::{BankError, Result};
use crate::ledger::journal::EntryType;
use crate::ledger::{validate_amount, AccountNumber, Amount, InstrumentId};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositMethod {
    Cash,
    Cheque,
    Transfer,
}

impl fmt::Display for DepositMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepositMethod::Cash => write!(f, "cash"),
            DepositMethod::Cheque => write!(f, "cheque"),
            DepositMethod::Transfer => write!(f, "transfer"),
        }
    }
}

impl FromStr for DepositMethod {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(DepositMethod::Cash),
            "cheque" => Ok(DepositMethod::Cheque),
            "transfer" => Ok(DepositMethod::Transfer),
            other => Err(BankError::validation(format!("unknown deposit method {:?}", other))),
        }
    }
}

/// A customer asking for money to be put on their account, credited once an
/// admin approves it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositRequest {
    pub id: InstrumentId,
    pub account_number: AccountNumber,
    pub amount: Amount,
    pub method: DepositMethod,
    pub reference: Option<String>,
    pub status: ApprovalStatus,
    pub requested: Stamp,
    pub reviewed: Option<Stamp>,
    pub transaction_id: Option<String>,
}

impl Instrument for DepositRequest {
    const KIND: &'static str = "deposit request";

    fn id(&self) -> InstrumentId {
        self.id
    }

    fn account_number(&self) -> &str {
        &self.account_number
    }
}

impl Approvable for DepositRequest {
    const ON_APPROVAL: EntryType = EntryType::Credit;

    fn approval_status(&self) -> ApprovalStatus {
        self.status
    }

    fn amount(&self) -> Amount {
        self.amount
    }

    fn description(&self) -> String {
        match &self.reference {
            Some(reference) => format!("Deposit by {} ({})", self.method, reference),
            None => format!("Deposit by {}", self.method),
        }
    }

    fn review(&mut self, status: ApprovalStatus, stamp: Stamp, transaction_id: Option<String>) {
        self.status = status;
        self.reviewed = Some(stamp);
        self.transaction_id = transaction_id;
    }
}

impl Bank {
    pub fn request_deposit(
        &self,
        account_number: &str,
        amount: Amount,
        method: DepositMethod,
        reference: Option<&str>,
        by: &str,
    ) -> Result<DepositRequest> {
        let amount = validate_amount(amount)?;
        let requested = Stamp::new(by, self.now());

        self.db.transaction(|tables| {
            ensure_account(tables, account_number)?;
            let request = DepositRequest {
                id: tables.deposit_requests.next_id(),
                account_number: account_number.to_string(),
                amount,
                method,
                reference: reference.map(str::to_string),
                status: ApprovalStatus::Pending,
                requested,
                reviewed: None,
                transaction_id: None,
            };
            tables.deposit_requests.insert(request.id, request.clone());

            Ok(request)
        })
    }

    pub fn deposit_request(&self, id: InstrumentId) -> Result<DepositRequest> {
        self.db.read(|tables| tables.deposit_requests.find(id).cloned())
    }

    pub fn approve_deposit_request(&self, id: InstrumentId, admin: &str) -> Result<Outcome<DepositRequest>> {
        let stamp = Stamp::new(admin, self.now());
        self.db
            .transaction(|tables| approve(tables, |t| &mut t.deposit_requests, id, stamp))
    }

    pub fn reject_deposit_request(&self, id: InstrumentId, admin: &str, reason: &str) -> Result<DepositRequest> {
        let stamp = Stamp::new(admin, self.now()).with_note(reason);
        self.db
            .transaction(|tables| reject(tables, |t| &mut t.deposit_requests, id, stamp))
    }
}

#[cfg(test)]
mod tests {
    use super::DepositMethod;
    use crate::bank::Bank;
    use crate::error::BankError;
    use crate::instruments::ApprovalStatus;
    use crate::ledger::account::AccountHolder;
    use crate::ledger::journal::EntryType;

    use rust_decimal_macros::dec;

    fn bank() -> Bank {
        let bank = Bank::default();
        bank.open_account("SB001", AccountHolder::new("Ravi"), dec!(100)).unwrap();
        bank
    }

    #[test]
    fn test_approve_credits_once() {
        let bank = bank();
        let request = bank
            .request_deposit("SB001", dec!(2500), DepositMethod::Transfer, Some("NEFT-1"), "ravi")
            .unwrap();
        assert_eq!(ApprovalStatus::Pending, request.status);

        let outcome = bank.approve_deposit_request(request.id, "admin").unwrap();
        assert_eq!(ApprovalStatus::Approved, outcome.instrument.status);
        assert_eq!(EntryType::Credit, outcome.entry.entry_type);
        assert_eq!("Deposit by transfer (NEFT-1)", outcome.entry.description);
        assert_eq!(Some(outcome.entry.transaction_id.clone()), outcome.instrument.transaction_id);
        assert_eq!(dec!(2600), bank.account("SB001").unwrap().balance());

        assert!(matches!(
            bank.approve_deposit_request(request.id, "admin"),
            Err(BankError::InvalidStateTransition { .. })
        ));
        assert!(bank.reject_deposit_request(request.id, "admin", "late").is_err());
        assert_eq!(2, bank.history("SB001").unwrap().len());
    }

    #[test]
    fn test_reject_moves_nothing() {
        let bank = bank();
        let request = bank
            .request_deposit("SB001", dec!(50), DepositMethod::Cash, None, "ravi")
            .unwrap();

        let rejected = bank.reject_deposit_request(request.id, "admin", "no cash received").unwrap();
        assert_eq!(ApprovalStatus::Rejected, rejected.status);
        assert_eq!(Some("no cash received".to_string()), rejected.reviewed.unwrap().note);
        assert_eq!(dec!(100), bank.account("SB001").unwrap().balance());
        assert!(bank.approve_deposit_request(request.id, "admin").is_err());
    }

    #[test]
    fn test_request_errors() {
        let bank = bank();
        for (account, amount, want) in vec![
            ("SB001", dec!(0), BankError::InvalidAmount(dec!(0))),
            ("SB001", dec!(-5), BankError::InvalidAmount(dec!(-5))),
            ("NOPE", dec!(5), BankError::AccountNotFound("NOPE".to_string())),
        ] {
            assert_eq!(
                Err(want),
                bank.request_deposit(account, amount, DepositMethod::Cash, None, "x")
            );
        }
        assert_eq!(
            Err(BankError::InstrumentNotFound {
                instrument: "deposit request",
                id: 9
            }),
            bank.approve_deposit_request(9, "admin")
        );
    }

    #[test]
    fn test_frozen_account_keeps_request_pending() {
        let bank = bank();
        let request = bank
            .request_deposit("SB001", dec!(50), DepositMethod::Cheque, None, "ravi")
            .unwrap();
        bank.set_account_status("SB001", crate::ledger::account::AccountStatus::Frozen)
            .unwrap();

        assert!(matches!(
            bank.approve_deposit_request(request.id, "admin"),
            Err(BankError::AccountInactive { .. })
        ));
        assert_eq!(ApprovalStatus::Pending, bank.deposit_request(request.id).unwrap().status);
    }
}

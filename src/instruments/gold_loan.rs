//! Loans secured on gold.
//!
//! The amount that can be lent is bounded by the value of the pledged gold.
//! Accepting the terms is a second axis, independent of the approval status,
//! and only possible once the loan is approved.

use super::{approve, ensure_account, reject, Approvable, ApprovalStatus, Instrument, Outcome, Stamp};
use crate::bank::Bank;
use crate::error::{BankError, Result};
use crate::interest;
use crate::ledger::journal::EntryType;
use crate::ledger::{validate_amount, AccountNumber, Amount, InstrumentId};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoldLoan {
    pub id: InstrumentId,
    pub account_number: AccountNumber,
    pub gold_weight_grams: Decimal,
    pub purity_karat: u32,
    pub eligible_amount: Amount,
    pub amount: Amount,
    pub interest_rate: Decimal,
    pub tenure_months: u32,
    pub emi_amount: Amount,
    pub status: ApprovalStatus,
    pub terms_accepted: bool,
    pub terms_accepted_at: Option<DateTime<Utc>>,
    pub requested: Stamp,
    pub reviewed: Option<Stamp>,
    pub transaction_id: Option<String>,
}

impl Instrument for GoldLoan {
    const KIND: &'static str = "gold loan";

    fn id(&self) -> InstrumentId {
        self.id
    }

    fn account_number(&self) -> &str {
        &self.account_number
    }
}

impl Approvable for GoldLoan {
    const ON_APPROVAL: EntryType = EntryType::Credit;

    fn approval_status(&self) -> ApprovalStatus {
        self.status
    }

    fn amount(&self) -> Amount {
        self.amount
    }

    fn description(&self) -> String {
        format!("Gold loan {} sanctioned", self.id)
    }

    fn review(&mut self, status: ApprovalStatus, stamp: Stamp, transaction_id: Option<String>) {
        self.status = status;
        self.reviewed = Some(stamp);
        self.transaction_id = transaction_id;
    }
}

impl Bank {
    /// Apply for a loan against `gold_weight_grams` of gold of the given purity.
    /// Fails if `amount` is more than the gold allows.
    pub fn apply_for_gold_loan(
        &self,
        account_number: &str,
        gold_weight_grams: Decimal,
        purity_karat: u32,
        amount: Amount,
        by: &str,
    ) -> Result<GoldLoan> {
        let amount = validate_amount(amount)?;
        if gold_weight_grams <= Decimal::ZERO {
            return Err(BankError::validation("gold weight must be positive"));
        }
        if !(1..=24).contains(&purity_karat) {
            return Err(BankError::validation(format!(
                "purity of {} karat is not between 1 and 24",
                purity_karat
            )));
        }

        let gold = &self.config().gold;
        let eligible_amount = interest::gold_loan_eligibility(gold_weight_grams, purity_karat, gold);
        if amount > eligible_amount {
            return Err(BankError::validation(format!(
                "requested {} but the gold only allows {}",
                amount, eligible_amount
            )));
        }
        let emi_amount = interest::emi(amount, gold.interest_rate, gold.tenure_months)?;
        let requested = Stamp::new(by, self.now());

        self.db.transaction(|tables| {
            ensure_account(tables, account_number)?;
            let loan = GoldLoan {
                id: tables.gold_loans.next_id(),
                account_number: account_number.to_string(),
                gold_weight_grams,
                purity_karat,
                eligible_amount,
                amount,
                interest_rate: gold.interest_rate,
                tenure_months: gold.tenure_months,
                emi_amount,
                status: ApprovalStatus::Pending,
                terms_accepted: false,
                terms_accepted_at: None,
                requested,
                reviewed: None,
                transaction_id: None,
            };
            tables.gold_loans.insert(loan.id, loan.clone());

            Ok(loan)
        })
    }

    pub fn gold_loan(&self, id: InstrumentId) -> Result<GoldLoan> {
        self.db.read(|tables| tables.gold_loans.find(id).cloned())
    }

    pub fn approve_gold_loan(&self, id: InstrumentId, admin: &str) -> Result<Outcome<GoldLoan>> {
        let stamp = Stamp::new(admin, self.now());
        self.db
            .transaction(|tables| approve(tables, |t| &mut t.gold_loans, id, stamp))
    }

    pub fn reject_gold_loan(&self, id: InstrumentId, admin: &str, reason: &str) -> Result<GoldLoan> {
        let stamp = Stamp::new(admin, self.now()).with_note(reason);
        self.db
            .transaction(|tables| reject(tables, |t| &mut t.gold_loans, id, stamp))
    }

    /// The borrower accepts the terms of an approved gold loan. No money moves.
    pub fn accept_gold_loan_terms(&self, id: InstrumentId) -> Result<GoldLoan> {
        let now = self.now();
        self.db.transaction(|tables| {
            let loan = tables.gold_loans.find_mut(id)?;
            if loan.status != ApprovalStatus::Approved {
                return Err(BankError::transition(GoldLoan::KIND, id, loan.status, "accept terms"));
            }
            if loan.terms_accepted {
                return Err(BankError::AlreadyProcessed(format!(
                    "terms of gold loan {} already accepted",
                    id
                )));
            }

            loan.terms_accepted = true;
            loan.terms_accepted_at = Some(now);
            Ok(loan.clone())
        })
    }
}

//! Cheques.
//!
//! Two axes: `status` tracks the leaf itself (ACTIVE, DRAWN, BOUNCED,
//! CANCELLED) and `request_status` tracks the customer's draw request and
//! its review (NONE, PENDING, APPROVED, REJECTED).
//!
//! ```text
//! request_status: NONE/REJECTED --request_draw--> PENDING --approve--> APPROVED
//!                                                 PENDING --reject---> REJECTED
//! status:         ACTIVE --draw (needs APPROVED)--> DRAWN --bounce--> BOUNCED
//!                 ACTIVE --cancel--> CANCELLED
//! ```

use super::{ensure_account, Instrument, Outcome, Stamp};
use crate::bank::Bank;
use crate::error::{BankError, Result};
use crate::ledger::journal::{self, EntryType, Transaction};
use crate::ledger::{validate_amount, AccountNumber, Amount, InstrumentId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChequeStatus {
    Active,
    Drawn,
    /// Clearing failed downstream after the funds had left the account.
    Bounced,
    Cancelled,
}

impl fmt::Display for ChequeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChequeStatus::Active => write!(f, "ACTIVE"),
            ChequeStatus::Drawn => write!(f, "DRAWN"),
            ChequeStatus::Bounced => write!(f, "BOUNCED"),
            ChequeStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    None,
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::None => write!(f, "NONE"),
            RequestStatus::Pending => write!(f, "PENDING"),
            RequestStatus::Approved => write!(f, "APPROVED"),
            RequestStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cheque {
    pub id: InstrumentId,
    pub account_number: AccountNumber,
    pub cheque_number: String,
    pub status: ChequeStatus,
    pub request_status: RequestStatus,
    pub amount: Option<Amount>,
    pub payee: Option<String>,
    pub issued_at: DateTime<Utc>,
    /// Who asked for the draw.
    pub requested: Option<Stamp>,
    /// Who approved or rejected the draw request.
    pub reviewed: Option<Stamp>,
    pub drawn_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub bounce_reason: Option<String>,
    pub last_action: Option<Stamp>,
}

impl Instrument for Cheque {
    const KIND: &'static str = "cheque";

    fn id(&self) -> InstrumentId {
        self.id
    }

    fn account_number(&self) -> &str {
        &self.account_number
    }
}

impl Cheque {
    fn refuse(&self, operation: &'static str) -> BankError {
        let current = format!("{}/{}", self.status, self.request_status);
        BankError::transition(Self::KIND, self.id, current, operation)
    }

    fn request_draw(&mut self, amount: Amount, payee: &str, stamp: Stamp) -> Result<()> {
        let open = matches!(self.request_status, RequestStatus::None | RequestStatus::Rejected);
        if self.status != ChequeStatus::Active || !open {
            return Err(self.refuse("request a draw"));
        }
        let amount = validate_amount(amount)?;

        self.amount = Some(amount);
        self.payee = Some(payee.to_string());
        self.request_status = RequestStatus::Pending;
        self.requested = Some(stamp.clone());
        self.reviewed = None;
        self.last_action = Some(stamp);

        Ok(())
    }

    fn review(&mut self, status: RequestStatus, stamp: Stamp) -> Result<()> {
        if self.request_status != RequestStatus::Pending {
            return Err(self.refuse(match status {
                RequestStatus::Approved => "approve the request",
                _ => "reject the request",
            }));
        }

        self.request_status = status;
        self.reviewed = Some(stamp.clone());
        self.last_action = Some(stamp);

        Ok(())
    }

    /// The amount to debit, if the cheque can be drawn right now.
    fn drawable_amount(&self) -> Result<Amount> {
        if self.status != ChequeStatus::Active || self.request_status != RequestStatus::Approved {
            return Err(self.refuse("draw"));
        }

        self.amount.ok_or_else(|| self.refuse("draw"))
    }

    fn mark_drawn(&mut self, entry: &Transaction, stamp: Stamp) {
        self.status = ChequeStatus::Drawn;
        self.drawn_at = Some(entry.timestamp);
        self.transaction_id = Some(entry.transaction_id.clone());
        self.last_action = Some(stamp);
    }

    fn bounce(&mut self, reason: &str, stamp: Stamp) -> Result<()> {
        if self.status != ChequeStatus::Drawn {
            return Err(self.refuse("bounce"));
        }

        self.status = ChequeStatus::Bounced;
        self.bounce_reason = Some(reason.to_string());
        self.last_action = Some(stamp.with_note(reason));

        Ok(())
    }

    fn cancel(&mut self, stamp: Stamp) -> Result<()> {
        if self.status != ChequeStatus::Active {
            return Err(self.refuse("cancel"));
        }

        self.status = ChequeStatus::Cancelled;
        self.last_action = Some(stamp);

        Ok(())
    }
}

fn validate_cheque_number(cheque_number: &str) -> Result<()> {
    if cheque_number.len() != 6 || !cheque_number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BankError::validation(format!(
            "cheque number {:?} must be 6 digits",
            cheque_number
        )));
    }

    Ok(())
}

impl Bank {
    /// Issue a blank cheque leaf on an account.
    pub fn issue_cheque(&self, account_number: &str, cheque_number: &str) -> Result<Cheque> {
        validate_cheque_number(cheque_number)?;
        let now = self.now();

        self.db.transaction(|tables| {
            ensure_account(tables, account_number)?;
            let duplicate = tables
                .cheques
                .for_account(account_number)
                .any(|cheque| cheque.cheque_number == cheque_number);
            if duplicate {
                return Err(BankError::validation(format!(
                    "cheque {} already issued on account {}",
                    cheque_number, account_number
                )));
            }

            let cheque = Cheque {
                id: tables.cheques.next_id(),
                account_number: account_number.to_string(),
                cheque_number: cheque_number.to_string(),
                status: ChequeStatus::Active,
                request_status: RequestStatus::None,
                amount: None,
                payee: None,
                issued_at: now,
                requested: None,
                reviewed: None,
                drawn_at: None,
                transaction_id: None,
                bounce_reason: None,
                last_action: None,
            };
            tables.cheques.insert(cheque.id, cheque.clone());

            Ok(cheque)
        })
    }

    pub fn cheque(&self, id: InstrumentId) -> Result<Cheque> {
        self.db.read(|tables| tables.cheques.find(id).cloned())
    }

    pub fn cheques_for(&self, account_number: &str) -> Vec<Cheque> {
        self.db
            .read(|tables| tables.cheques.for_account(account_number).cloned().collect())
    }

    /// The customer asks for the cheque to be drawn. No money moves yet.
    pub fn request_cheque_draw(
        &self,
        id: InstrumentId,
        amount: Amount,
        payee: &str,
        requested_by: &str,
    ) -> Result<Cheque> {
        let stamp = Stamp::new(requested_by, self.now());
        self.db.transaction(|tables| {
            let cheque = tables.cheques.find_mut(id)?;
            cheque.request_draw(amount, payee, stamp)?;
            Ok(cheque.clone())
        })
    }

    /// Approve a pending draw request, then draw the cheque.
    ///
    /// The approval is committed on its own: when the draw fails (typically
    /// `InsufficientFunds`) the cheque stays APPROVED and un-drawn, and
    /// [`Bank::draw_cheque`] can be retried.
    pub fn approve_cheque_request(&self, id: InstrumentId, admin: &str) -> Result<Outcome<Cheque>> {
        let stamp = Stamp::new(admin, self.now());
        self.db.transaction(|tables| {
            let cheque = tables.cheques.find_mut(id)?;
            cheque.review(RequestStatus::Approved, stamp)
        })?;
        tracing::info!(cheque = id, %admin, "cheque request approved");

        self.draw_cheque(id, admin)
    }

    pub fn reject_cheque_request(&self, id: InstrumentId, admin: &str, reason: &str) -> Result<Cheque> {
        let stamp = Stamp::new(admin, self.now()).with_note(reason);
        self.db.transaction(|tables| {
            let cheque = tables.cheques.find_mut(id)?;
            cheque.review(RequestStatus::Rejected, stamp)?;
            Ok(cheque.clone())
        })
    }

    /// Debit the account for an approved cheque and mark it DRAWN.
    pub fn draw_cheque(&self, id: InstrumentId, actor: &str) -> Result<Outcome<Cheque>> {
        let stamp = Stamp::new(actor, self.now());
        let outcome = self.db.transaction(|tables| {
            let cheque = tables.cheques.find(id)?;
            let amount = cheque.drawable_amount()?;
            let account_number = cheque.account_number.clone();
            let description = format!(
                "Cheque {} to {}",
                cheque.cheque_number,
                cheque.payee.as_deref().unwrap_or("bearer")
            );

            let entry = journal::post(
                tables,
                stamp.at,
                &account_number,
                EntryType::Debit,
                amount,
                &description,
            )?;
            let cheque = tables.cheques.find_mut(id)?;
            cheque.mark_drawn(&entry, stamp);

            Ok(Outcome {
                instrument: cheque.clone(),
                entry,
            })
        });

        match &outcome {
            Ok(outcome) => tracing::info!(
                cheque = id,
                account = %outcome.instrument.account_number,
                amount = %outcome.entry.amount,
                "cheque drawn"
            ),
            Err(err) => tracing::warn!(cheque = id, error = %err, "cheque not drawn"),
        }
        outcome
    }

    /// Record a clearing failure on a drawn cheque.
    ///
    /// The debit is not reversed here: the funds already left the account, and
    /// giving them back is a separate, explicit credit.
    pub fn bounce_cheque(&self, id: InstrumentId, reason: &str, actor: &str) -> Result<Cheque> {
        let stamp = Stamp::new(actor, self.now());
        let cheque = self.db.transaction(|tables| {
            let cheque = tables.cheques.find_mut(id)?;
            cheque.bounce(reason, stamp)?;
            Ok(cheque.clone())
        })?;

        tracing::warn!(cheque = id, %reason, "cheque bounced");
        Ok(cheque)
    }

    pub fn cancel_cheque(&self, id: InstrumentId, actor: &str) -> Result<Cheque> {
        let stamp = Stamp::new(actor, self.now());
        self.db.transaction(|tables| {
            let cheque = tables.cheques.find_mut(id)?;
            cheque.cancel(stamp)?;
            Ok(cheque.clone())
        })
    }
}

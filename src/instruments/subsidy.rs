//! Interest subsidy on education loans.
//!
//! The subsidy is the interest the student would pay over the first years of
//! the loan. Eligibility depends on the student's age and the family income,
//! and an account can only hold a limited number of live claims.

use super::{approve, ensure_account, reject, validate_rate, Approvable, ApprovalStatus, Instrument, Outcome, Stamp};
use crate::bank::Bank;
use crate::error::{BankError, Result};
use crate::interest;
use crate::ledger::account::validate_aadhar;
use crate::ledger::journal::EntryType;
use crate::ledger::{validate_amount, AccountNumber, Amount, InstrumentId};

use rust_decimal::Decimal;
use serde::Serialize;

/// Who is claiming, and for which loan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsidyApplication {
    pub student_name: String,
    pub aadhar: String,
    pub student_age: u32,
    pub family_income: Amount,
    pub loan_principal: Amount,
    pub loan_interest_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsidyClaim {
    pub id: InstrumentId,
    pub account_number: AccountNumber,
    pub application: SubsidyApplication,
    pub subsidy_amount: Amount,
    pub status: ApprovalStatus,
    pub requested: Stamp,
    pub reviewed: Option<Stamp>,
    pub transaction_id: Option<String>,
}

impl Instrument for SubsidyClaim {
    const KIND: &'static str = "subsidy claim";

    fn id(&self) -> InstrumentId {
        self.id
    }

    fn account_number(&self) -> &str {
        &self.account_number
    }
}

impl Approvable for SubsidyClaim {
    const ON_APPROVAL: EntryType = EntryType::Credit;

    fn approval_status(&self) -> ApprovalStatus {
        self.status
    }

    fn amount(&self) -> Amount {
        self.subsidy_amount
    }

    fn description(&self) -> String {
        format!("Education loan subsidy {} for {}", self.id, self.application.student_name)
    }

    fn review(&mut self, status: ApprovalStatus, stamp: Stamp, transaction_id: Option<String>) {
        self.status = status;
        self.reviewed = Some(stamp);
        self.transaction_id = transaction_id;
    }
}

impl Bank {
    pub fn claim_education_subsidy(
        &self,
        account_number: &str,
        application: SubsidyApplication,
        by: &str,
    ) -> Result<SubsidyClaim> {
        let rules = &self.config().subsidy;
        if application.student_name.trim().is_empty() {
            return Err(BankError::validation("student name is empty"));
        }
        validate_aadhar(&application.aadhar)?;
        if !(rules.min_age..=rules.max_age).contains(&application.student_age) {
            return Err(BankError::validation(format!(
                "student age {} is not between {} and {}",
                application.student_age, rules.min_age, rules.max_age
            )));
        }
        if application.family_income < Amount::ZERO || application.family_income > rules.family_income_ceiling {
            return Err(BankError::validation(format!(
                "family income {} is above the ceiling of {}",
                application.family_income, rules.family_income_ceiling
            )));
        }
        let principal = validate_amount(application.loan_principal)?;
        validate_rate(application.loan_interest_rate)?;
        let subsidy_amount =
            interest::three_year_interest_projection(principal, application.loan_interest_rate, rules)?;
        if subsidy_amount <= Amount::ZERO {
            return Err(BankError::validation(format!(
                "a loan of {} at {}% accrues no interest to subsidise",
                principal, application.loan_interest_rate
            )));
        }
        let requested = Stamp::new(by, self.now());

        self.db.transaction(|tables| {
            ensure_account(tables, account_number)?;
            let live_claims = tables
                .subsidy_claims
                .for_account(account_number)
                .filter(|claim| claim.status != ApprovalStatus::Rejected)
                .count();
            if live_claims >= rules.max_claims_per_account {
                return Err(BankError::AlreadyProcessed("subsidy claim limit reached".to_string()));
            }

            let claim = SubsidyClaim {
                id: tables.subsidy_claims.next_id(),
                account_number: account_number.to_string(),
                application,
                subsidy_amount,
                status: ApprovalStatus::Pending,
                requested,
                reviewed: None,
                transaction_id: None,
            };
            tables.subsidy_claims.insert(claim.id, claim.clone());
            tracing::info!(claim = claim.id, account = %account_number, subsidy = %subsidy_amount, "subsidy claimed");

            Ok(claim)
        })
    }

    pub fn subsidy_claim(&self, id: InstrumentId) -> Result<SubsidyClaim> {
        self.db.read(|tables| tables.subsidy_claims.find(id).cloned())
    }

    pub fn approve_subsidy_claim(&self, id: InstrumentId, admin: &str) -> Result<Outcome<SubsidyClaim>> {
        let stamp = Stamp::new(admin, self.now());
        self.db
            .transaction(|tables| approve(tables, |t| &mut t.subsidy_claims, id, stamp))
    }

    pub fn reject_subsidy_claim(&self, id: InstrumentId, admin: &str, reason: &str) -> Result<SubsidyClaim> {
        let stamp = Stamp::new(admin, self.now()).with_note(reason);
        self.db
            .transaction(|tables| reject(tables, |t| &mut t.subsidy_claims, id, stamp))
    }
}

#[cfg(test)]
mod tests {
    use super::SubsidyApplication;
    use crate::bank::Bank;
    use crate::config::SubsidyConfig;
    use crate::error::BankError;
    use crate::instruments::ApprovalStatus;
    use crate::interest;
    use crate::ledger::account::AccountHolder;

    use rust_decimal_macros::dec;

    fn bank() -> Bank {
        let bank = Bank::default();
        bank.open_account("SB001", AccountHolder::new("Arjun"), dec!(0)).unwrap();
        bank
    }

    fn application() -> SubsidyApplication {
        SubsidyApplication {
            student_name: "Arjun".to_string(),
            aadhar: "234567890123".to_string(),
            student_age: 21,
            family_income: dec!(300000),
            loan_principal: dec!(500000),
            loan_interest_rate: dec!(9.5),
        }
    }

    #[test]
    fn test_claim_and_approve() {
        let bank = bank();
        let claim = bank.claim_education_subsidy("SB001", application(), "arjun").unwrap();

        let want = interest::three_year_interest_projection(dec!(500000), dec!(9.5), &SubsidyConfig::default())
            .unwrap();
        assert_eq!(want, claim.subsidy_amount);

        let outcome = bank.approve_subsidy_claim(claim.id, "admin").unwrap();
        assert_eq!(ApprovalStatus::Approved, outcome.instrument.status);
        assert_eq!(want, bank.account("SB001").unwrap().balance());
        assert!(bank.approve_subsidy_claim(claim.id, "admin").is_err());
    }

    #[test]
    fn test_claim_limit() {
        let bank = bank();
        let claim = bank.claim_education_subsidy("SB001", application(), "arjun").unwrap();

        assert_eq!(
            Err(BankError::AlreadyProcessed("subsidy claim limit reached".to_string())),
            bank.claim_education_subsidy("SB001", application(), "arjun")
        );

        // A rejected claim no longer counts.
        bank.reject_subsidy_claim(claim.id, "admin", "documents missing").unwrap();
        assert!(bank.claim_education_subsidy("SB001", application(), "arjun").is_ok());
    }

    #[test]
    fn test_claim_validation() {
        let bank = bank();
        let cases: Vec<Box<dyn Fn(&mut SubsidyApplication)>> = vec![
            Box::new(|a| a.aadhar = "123456789012".to_string()),
            Box::new(|a| a.aadhar = "23456789".to_string()),
            Box::new(|a| a.student_age = 15),
            Box::new(|a| a.student_age = 36),
            Box::new(|a| a.family_income = dec!(450000.01)),
            Box::new(|a| a.student_name = " ".to_string()),
            Box::new(|a| a.loan_interest_rate = dec!(0)),
            Box::new(|a| a.loan_principal = dec!(0.01)),
        ];
        for change in cases {
            let mut application = application();
            change(&mut application);
            assert!(matches!(
                bank.claim_education_subsidy("SB001", application, "arjun"),
                Err(BankError::ValidationFailed(_))
            ));
        }

        // None of the refused claims counts towards the limit.
        let mut application = application();
        application.family_income = dec!(450000);
        assert!(bank.claim_education_subsidy("SB001", application, "arjun").is_ok());
    }
}

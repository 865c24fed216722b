use crate::bank::Bank;
use crate::error::{BankError, Result};
use crate::input::{Command, BATCH_DEPOSIT_METHOD};
use crate::ledger::account::{Account, AccountHolder};
use crate::scheduler::SettlementScheduler;

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// A command that could not be applied, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub command: Command,
    pub error: BankError,
}

pub fn process(
    bank: Arc<Bank>,
    commands: Receiver<Command>,
    accounts_tx: Sender<Account>,
) -> Receiver<Failure> {
    let (tx, rx) = mpsc::channel();

    // Commands are applied in a new thread, to be able to stream errors as
    // we go. The bank is shared, so other threads can work on it meanwhile.
    std::thread::spawn(move || {
        for command in commands {
            if let Err(error) = apply(&bank, command.clone()) {
                if tx.send(Failure { command, error }).is_err() {
                    tracing::debug!("failure receiver is gone");
                }
            }
        }

        for account in bank.accounts() {
            if accounts_tx.send(account).is_err() {
                break;
            }
        }
    });

    rx
}

/// Apply one command. Operations on instruments go through the same
/// transitions as any other caller, so the batch gets the same guarantees.
pub fn apply(bank: &Arc<Bank>, command: Command) -> Result<()> {
    match command {
        Command::Open {
            account,
            holder,
            opening_balance,
        } => {
            bank.open_account(&account, AccountHolder::new(holder), opening_balance)?;
        }
        Command::Credit {
            account,
            amount,
            description,
        } => {
            bank.credit(&account, amount, &description)?;
        }
        Command::Debit {
            account,
            amount,
            description,
        } => {
            bank.debit(&account, amount, &description)?;
        }
        Command::ChequeIssue {
            account,
            cheque_number,
        } => {
            bank.issue_cheque(&account, &cheque_number)?;
        }
        Command::ChequeRequest {
            cheque,
            amount,
            payee,
            actor,
        } => {
            bank.request_cheque_draw(cheque, amount, &payee, &actor)?;
        }
        Command::ChequeApprove { cheque, actor } => {
            bank.approve_cheque_request(cheque, &actor)?;
        }
        Command::ChequeReject {
            cheque,
            actor,
            reason,
        } => {
            bank.reject_cheque_request(cheque, &actor, &reason)?;
        }
        Command::ChequeDraw { cheque, actor } => {
            bank.draw_cheque(cheque, &actor)?;
        }
        Command::ChequeBounce {
            cheque,
            actor,
            reason,
        } => {
            bank.bounce_cheque(cheque, &reason, &actor)?;
        }
        Command::ChequeCancel { cheque, actor } => {
            bank.cancel_cheque(cheque, &actor)?;
        }
        Command::FdOpen {
            account,
            principal,
            rate,
            tenure_months,
        } => {
            bank.open_fixed_deposit(&account, principal, rate, tenure_months)?;
        }
        Command::FdApprove { deposit, actor } => {
            bank.approve_fixed_deposit(deposit, &actor)?;
        }
        Command::FdReject {
            deposit,
            actor,
            reason,
        } => {
            bank.reject_fixed_deposit(deposit, &actor, &reason)?;
        }
        Command::FdMature { deposit } => {
            bank.process_maturity(deposit)?;
        }
        Command::LoanApply {
            account,
            kind,
            principal,
            rate,
            tenure_months,
        } => {
            bank.apply_for_loan(&account, kind, principal, rate, tenure_months)?;
        }
        Command::LoanApprove { loan, actor } => {
            bank.approve_loan(loan, &actor)?;
        }
        Command::EmiPay { emi } => {
            bank.pay_emi(emi)?;
        }
        Command::DepositRequest {
            account,
            amount,
            reference,
            actor,
        } => {
            bank.request_deposit(&account, amount, BATCH_DEPOSIT_METHOD, reference.as_deref(), &actor)?;
        }
        Command::DepositApprove { request, actor } => {
            bank.approve_deposit_request(request, &actor)?;
        }
        Command::DepositReject {
            request,
            actor,
            reason,
        } => {
            bank.reject_deposit_request(request, &actor, &reason)?;
        }
        Command::Settle => {
            let report = SettlementScheduler::new(Arc::clone(bank)).run(bank.now());
            if let Some((_, error)) = report.failed.into_iter().next() {
                return Err(error);
            }
        }
    }

    Ok(())
}

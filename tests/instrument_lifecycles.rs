use bank_ledger::clock::FixedClock;
use bank_ledger::instruments::cheque::ChequeStatus;
use bank_ledger::instruments::fixed_deposit::FixedDepositStatus;
use bank_ledger::instruments::loan::{LoanKind, LoanStatus};
use bank_ledger::ledger::account::AccountHolder;
use bank_ledger::ledger::journal::replay;
use bank_ledger::{Bank, BankConfig, BankError, SettlementScheduler};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn bank_on(day: NaiveDate) -> (Arc<Bank>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::on(day));
    let bank = Arc::new(Bank::with_clock(BankConfig::default(), clock.clone()));
    (bank, clock)
}

fn entries(bank: &Bank, account: &str) -> usize {
    bank.history(account).unwrap().len()
}

#[test]
fn test_cheque_drawn_twice_is_refused() {
    let (bank, _) = bank_on(date(2024, 3, 1));
    bank.open_account("SB001", AccountHolder::new("Asha"), dec!(5000)).unwrap();
    let cheque = bank.issue_cheque("SB001", "123456").unwrap();
    bank.request_cheque_draw(cheque.id, dec!(1200), "Ravi", "asha").unwrap();
    bank.approve_cheque_request(cheque.id, "manager").unwrap();
    let before = entries(&bank, "SB001");

    assert!(matches!(
        bank.draw_cheque(cheque.id, "teller"),
        Err(BankError::InvalidStateTransition { .. })
    ));
    assert_eq!(before, entries(&bank, "SB001"));
    assert_eq!(ChequeStatus::Drawn, bank.cheque(cheque.id).unwrap().status);
    assert_eq!(dec!(3800), bank.account("SB001").unwrap().balance());
}

#[test]
fn test_cheque_with_insufficient_funds_changes_nothing_but_the_approval() {
    let (bank, _) = bank_on(date(2024, 3, 1));
    bank.open_account("SB001", AccountHolder::new("Asha"), dec!(500)).unwrap();
    let cheque = bank.issue_cheque("SB001", "654321").unwrap();
    bank.request_cheque_draw(cheque.id, dec!(1000), "Ravi", "asha").unwrap();

    assert!(matches!(
        bank.approve_cheque_request(cheque.id, "manager"),
        Err(BankError::InsufficientFunds { .. })
    ));
    assert_eq!(ChequeStatus::Active, bank.cheque(cheque.id).unwrap().status);
    assert_eq!(1, entries(&bank, "SB001"));
    assert_eq!(dec!(500), bank.account("SB001").unwrap().balance());
}

#[test]
fn test_fixed_deposit_full_life() {
    let (bank, clock) = bank_on(date(2024, 1, 15));
    bank.open_account("SB001", AccountHolder::new("Lata"), dec!(100000)).unwrap();
    let deposit = bank.open_fixed_deposit("SB001", dec!(100000), Some(dec!(8)), 12).unwrap();
    bank.approve_fixed_deposit(deposit.id, "manager").unwrap();
    let scheduler = SettlementScheduler::new(bank.clone());

    // One interest payment per month, however often the scheduler runs.
    for month in 2..=12 {
        clock.set_date(date(2024, month, 1));
        assert_eq!(vec![deposit.id], scheduler.run(bank.now()).credited);
        clock.set_date(date(2024, month, 20));
        assert_eq!(vec![deposit.id], scheduler.run(bank.now()).skipped);
    }
    clock.set_date(date(2025, 1, 1));
    assert_eq!(vec![deposit.id], scheduler.run(bank.now()).credited);

    let active = bank.fixed_deposit(deposit.id).unwrap();
    assert_eq!(12, active.months_interest_credited);
    assert_eq!(dec!(666.67) * dec!(12), active.total_interest_credited);

    clock.set_date(date(2025, 1, 15));
    bank.process_maturity(deposit.id).unwrap();
    let before = entries(&bank, "SB001");
    assert!(matches!(
        bank.process_maturity(deposit.id),
        Err(BankError::InvalidStateTransition { .. })
    ));
    assert_eq!(before, entries(&bank, "SB001"));

    let matured = bank.fixed_deposit(deposit.id).unwrap();
    assert_eq!(FixedDepositStatus::Matured, matured.status);
    assert!(matured.is_matured);
    assert_eq!(
        dec!(108000.00) + dec!(666.67) * dec!(12),
        bank.account("SB001").unwrap().balance()
    );
}

#[test]
fn test_loan_repaid_in_full() {
    let (bank, clock) = bank_on(date(2024, 1, 5));
    bank.open_account("SB001", AccountHolder::new("Imran"), dec!(10000)).unwrap();
    let loan = bank
        .apply_for_loan("SB001", LoanKind::Personal, dec!(120000), Some(dec!(12)), 12)
        .unwrap();
    bank.approve_loan(loan.id, "manager").unwrap();

    let schedule = bank.loan_schedule(loan.id).unwrap();
    assert_eq!(date(2024, 2, 5), schedule[0].due_date);
    for emi in &schedule {
        clock.set_date(emi.due_date);
        bank.pay_emi(emi.id).unwrap();
    }

    let before = entries(&bank, "SB001");
    assert!(matches!(
        bank.pay_emi(schedule[11].id),
        Err(BankError::InvalidStateTransition { .. })
    ));
    assert_eq!(before, entries(&bank, "SB001"));

    let paid = bank.loan(loan.id).unwrap();
    assert_eq!(LoanStatus::Paid, paid.status);
    assert_eq!(dec!(0), bank.outstanding_principal(loan.id).unwrap());

    let interest: Decimal = schedule.iter().map(|emi| emi.interest_component).sum();
    assert_eq!(dec!(10000) - interest, bank.account("SB001").unwrap().balance());

    let history = bank.history("SB001").unwrap();
    assert_eq!(bank.account("SB001").unwrap().balance(), replay(Decimal::ZERO, &history));
}

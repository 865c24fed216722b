//! Periodic settlement of fixed deposits.
//!
//! Every run walks the active deposits and credits the month's interest on
//! each one, in its own unit of work. One deposit failing does not stop the
//! others; the failure ends up in the report and the next run tries again.

use crate::bank::Bank;
use crate::error::BankError;
use crate::instruments::fixed_deposit::FixedDepositStatus;
use crate::ledger::InstrumentId;

use chrono::{DateTime, Utc};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// What a single run did, deposit by deposit.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementReport {
    pub run_at: DateTime<Utc>,
    pub credited: Vec<InstrumentId>,
    pub matured: Vec<InstrumentId>,
    /// Interest for the month was already paid.
    pub skipped: Vec<InstrumentId>,
    pub failed: Vec<(InstrumentId, BankError)>,
}

impl SettlementReport {
    fn new(run_at: DateTime<Utc>) -> Self {
        Self {
            run_at,
            credited: Vec::new(),
            matured: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }
}

pub struct SettlementScheduler {
    bank: Arc<Bank>,
}

impl SettlementScheduler {
    pub fn new(bank: Arc<Bank>) -> Self {
        Self { bank }
    }

    /// Settle every active deposit as of `now`.
    pub fn run(&self, now: DateTime<Utc>) -> SettlementReport {
        let today = now.date_naive();
        let sweep_maturities = self.bank.config().scheduler.sweep_maturities;
        let mut report = SettlementReport::new(now);

        let active = self
            .bank
            .fixed_deposits()
            .into_iter()
            .filter(|deposit| deposit.status == FixedDepositStatus::Active);
        for deposit in active {
            if deposit.is_due(today) {
                if !sweep_maturities {
                    continue;
                }
                match self.bank.process_maturity_at(deposit.id, now) {
                    Ok(_) => report.matured.push(deposit.id),
                    Err(err) => report.failed.push((deposit.id, err)),
                }
                continue;
            }

            match self.bank.credit_fixed_deposit_interest_at(deposit.id, now) {
                Ok(_) => report.credited.push(deposit.id),
                Err(BankError::AlreadyProcessed(_)) => report.skipped.push(deposit.id),
                Err(err) => {
                    tracing::warn!(fixed_deposit = deposit.id, error = %err, "interest not credited");
                    report.failed.push((deposit.id, err));
                }
            }
        }

        tracing::info!(
            credited = report.credited.len(),
            matured = report.matured.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "settlement run finished"
        );
        report
    }

    /// [`spawn`](Self::spawn) at the configured cadence.
    pub fn start(self) -> SchedulerHandle {
        let cadence = self.bank.config().scheduler.cadence();
        tracing::info!(cadence_secs = cadence.as_secs(), "settlement scheduler started");
        self.spawn(cadence)
    }

    /// Run every `cadence` on a background thread, until the handle is
    /// stopped or dropped.
    pub fn spawn(self, cadence: Duration) -> SchedulerHandle {
        let (stop, stopped) = mpsc::channel::<()>();

        let thread = std::thread::spawn(move || loop {
            match stopped.recv_timeout(cadence) {
                Err(RecvTimeoutError::Timeout) => {
                    self.run(self.bank.now());
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        SchedulerHandle { stop, thread }
    }
}

pub struct SchedulerHandle {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler and wait for the run in progress, if any.
    pub fn stop(self) {
        // The thread may be gone already, in which case there is nothing to stop.
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            tracing::error!("settlement scheduler panicked");
        }
    }
}

use crate::instruments::deposit_request::DepositMethod;
use crate::instruments::loan::LoanKind;
use crate::ledger::{AccountNumber, Amount, InstrumentId};

use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, PartialEq)]
pub enum Error {
    Csv(String),    // CSV is malformed
    Format(String), // Data format is incorrect
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Csv(msg) => write!(f, "malformed CSV: {}", msg),
            Error::Format(msg) => write!(f, "invalid record: {}", msg),
        }
    }
}

/// Who an operation is attributed to when the row leaves `actor` empty.
pub const DEFAULT_ACTOR: &str = "batch";

/// Deposits made through a batch file are treated as cash at the counter.
pub const BATCH_DEPOSIT_METHOD: DepositMethod = DepositMethod::Cash;

/// One operation against the bank, as read from a batch file.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open { account: AccountNumber, holder: String, opening_balance: Amount },
    Credit { account: AccountNumber, amount: Amount, description: String },
    Debit { account: AccountNumber, amount: Amount, description: String },
    ChequeIssue { account: AccountNumber, cheque_number: String },
    ChequeRequest { cheque: InstrumentId, amount: Amount, payee: String, actor: String },
    ChequeApprove { cheque: InstrumentId, actor: String },
    ChequeReject { cheque: InstrumentId, actor: String, reason: String },
    ChequeDraw { cheque: InstrumentId, actor: String },
    ChequeBounce { cheque: InstrumentId, actor: String, reason: String },
    ChequeCancel { cheque: InstrumentId, actor: String },
    FdOpen { account: AccountNumber, principal: Amount, rate: Option<Decimal>, tenure_months: u32 },
    FdApprove { deposit: InstrumentId, actor: String },
    FdReject { deposit: InstrumentId, actor: String, reason: String },
    FdMature { deposit: InstrumentId },
    LoanApply { account: AccountNumber, kind: LoanKind, principal: Amount, rate: Option<Decimal>, tenure_months: u32 },
    LoanApprove { loan: InstrumentId, actor: String },
    EmiPay { emi: InstrumentId },
    DepositRequest { account: AccountNumber, amount: Amount, reference: Option<String>, actor: String },
    DepositApprove { request: InstrumentId, actor: String },
    DepositReject { request: InstrumentId, actor: String, reason: String },
    Settle,
}

// Like the accounts, rows are read on their own thread so processing can
// start before the whole file is parsed. Bad rows are reported on the error
// channel and skipped; the rest of the file is still applied.
pub fn parse(input_stream: (impl std::io::Read + Send + 'static)) -> (Receiver<Command>, Receiver<Error>) {
    let (command_tx, command_rx): (Sender<Command>, Receiver<Command>) = mpsc::channel();
    let (error_tx, error_rx): (Sender<Error>, Receiver<Error>) = mpsc::channel();

    let buffered = std::io::BufReader::new(input_stream);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(buffered);

    std::thread::spawn(move || {
        for record in reader.deserialize::<CommandRecord>() {
            // Sending only fails once the receiving side is gone, and then
            // nobody is left to read the remaining rows anyway.
            let sent = match convert(record) {
                Ok(command) => command_tx.send(command).is_ok(),
                Err(err) => error_tx.send(err).is_ok(),
            };
            if !sent {
                break;
            }
        }
    });

    (command_rx, error_rx)
}

// Convert from a csv deserialise result into a command result.
fn convert(record: Result<CommandRecord, csv::Error>) -> Result<Command, Error> {
    Command::try_from(record?).map_err(Error::Format)
}

// Rows are deserialised into a flat record first: csv cannot deserialise
// straight into an enum with data (https://github.com/BurntSushi/rust-csv/issues/211).
#[derive(Debug, Deserialize)]
pub struct CommandRecord {
    #[serde(rename = "type")]
    op: CommandType,
    account: Option<AccountNumber>,
    id: Option<InstrumentId>,
    amount: Option<Decimal>,
    rate: Option<Decimal>,
    tenure: Option<u32>,
    actor: Option<String>,
    note: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Open,
    Credit,
    Debit,
    ChequeIssue,
    ChequeRequest,
    ChequeApprove,
    ChequeReject,
    ChequeDraw,
    ChequeBounce,
    ChequeCancel,
    FdOpen,
    FdApprove,
    FdReject,
    FdMature,
    LoanApply,
    LoanApprove,
    EmiPay,
    DepositRequest,
    DepositApprove,
    DepositReject,
    Settle,
}

fn required<T>(value: Option<T>, field: &str, op: CommandType) -> Result<T, String> {
    value.ok_or_else(|| format!("missing {} for {:?}", field, op))
}

impl CommandRecord {
    fn account(&mut self) -> Result<AccountNumber, String> {
        required(self.account.take().filter(|a| !a.is_empty()), "account", self.op)
    }

    fn id(&self) -> Result<InstrumentId, String> {
        required(self.id, "id", self.op)
    }

    fn amount(&self) -> Result<Amount, String> {
        required(self.amount, "amount", self.op)
    }

    fn tenure(&self) -> Result<u32, String> {
        required(self.tenure, "tenure", self.op)
    }

    fn actor(&mut self) -> String {
        self.actor
            .take()
            .filter(|actor| !actor.is_empty())
            .unwrap_or_else(|| DEFAULT_ACTOR.to_string())
    }

    fn note(&mut self) -> Option<String> {
        self.note.take().filter(|note| !note.is_empty())
    }
}

impl TryFrom<CommandRecord> for Command {
    type Error = String;

    fn try_from(mut record: CommandRecord) -> Result<Self, Self::Error> {
        let op = record.op;
        let command = match op {
            CommandType::Open => Command::Open {
                account: record.account()?,
                holder: required(record.note(), "holder name (note)", op)?,
                opening_balance: record.amount.unwrap_or(Decimal::ZERO),
            },
            CommandType::Credit => Command::Credit {
                account: record.account()?,
                amount: record.amount()?,
                description: record.note().unwrap_or_else(|| "Credit".to_string()),
            },
            CommandType::Debit => Command::Debit {
                account: record.account()?,
                amount: record.amount()?,
                description: record.note().unwrap_or_else(|| "Debit".to_string()),
            },
            CommandType::ChequeIssue => Command::ChequeIssue {
                account: record.account()?,
                cheque_number: required(record.note(), "cheque number (note)", op)?,
            },
            CommandType::ChequeRequest => Command::ChequeRequest {
                cheque: record.id()?,
                amount: record.amount()?,
                payee: required(record.note(), "payee (note)", op)?,
                actor: record.actor(),
            },
            CommandType::ChequeApprove => Command::ChequeApprove {
                cheque: record.id()?,
                actor: record.actor(),
            },
            CommandType::ChequeReject => Command::ChequeReject {
                cheque: record.id()?,
                actor: record.actor(),
                reason: record.note().unwrap_or_default(),
            },
            CommandType::ChequeDraw => Command::ChequeDraw {
                cheque: record.id()?,
                actor: record.actor(),
            },
            CommandType::ChequeBounce => Command::ChequeBounce {
                cheque: record.id()?,
                actor: record.actor(),
                reason: required(record.note(), "reason (note)", op)?,
            },
            CommandType::ChequeCancel => Command::ChequeCancel {
                cheque: record.id()?,
                actor: record.actor(),
            },
            CommandType::FdOpen => Command::FdOpen {
                account: record.account()?,
                principal: record.amount()?,
                rate: record.rate,
                tenure_months: record.tenure()?,
            },
            CommandType::FdApprove => Command::FdApprove {
                deposit: record.id()?,
                actor: record.actor(),
            },
            CommandType::FdReject => Command::FdReject {
                deposit: record.id()?,
                actor: record.actor(),
                reason: record.note().unwrap_or_default(),
            },
            CommandType::FdMature => Command::FdMature { deposit: record.id()? },
            CommandType::LoanApply => Command::LoanApply {
                account: record.account()?,
                kind: match record.note() {
                    Some(kind) => kind.parse().map_err(|err: crate::error::BankError| err.to_string())?,
                    None => LoanKind::Personal,
                },
                principal: record.amount()?,
                rate: record.rate,
                tenure_months: record.tenure()?,
            },
            CommandType::LoanApprove => Command::LoanApprove {
                loan: record.id()?,
                actor: record.actor(),
            },
            CommandType::EmiPay => Command::EmiPay { emi: record.id()? },
            CommandType::DepositRequest => Command::DepositRequest {
                account: record.account()?,
                amount: record.amount()?,
                reference: record.note(),
                actor: record.actor(),
            },
            CommandType::DepositApprove => Command::DepositApprove {
                request: record.id()?,
                actor: record.actor(),
            },
            CommandType::DepositReject => Command::DepositReject {
                request: record.id()?,
                actor: record.actor(),
                reason: record.note().unwrap_or_default(),
            },
            CommandType::Settle => Command::Settle,
        };

        Ok(command)
    }
}

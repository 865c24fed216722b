use crate::bank::Bank;
use crate::{error_handler, input, output, process};

use std::io;
use std::sync::mpsc;
use std::sync::Arc;

/// What happened to the rows of a batch that were not applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Rows that could not be read.
    pub malformed: usize,
    /// Rows that were read but refused by the bank.
    pub failed: usize,
}

// Reads operations from `input`, applies them to the bank in order and
// writes every account, with its final balance, to `output`.
//
// Parsing, processing and error handling each get their own thread, linked
// by channels, so the accounts can be written as soon as the last operation
// is applied.
pub fn run(
    bank: Arc<Bank>,
    input: (impl io::Read + Send + 'static),
    output: impl io::Write,
) -> io::Result<Summary> {
    let (commands, input_errors) = input::parse(input);
    let (accounts_tx, accounts) = mpsc::channel();
    let failures = process::process(bank, commands, accounts_tx);
    let sinks = error_handler::sink(input_errors, failures);

    output::write(output, accounts)?;

    let mut counts = Vec::with_capacity(sinks.len());
    for handle in sinks {
        let count = handle
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "error sink panicked"))?;
        counts.push(count);
    }

    Ok(Summary {
        malformed: counts.first().copied().unwrap_or_default(),
        failed: counts.get(1).copied().unwrap_or_default(),
    })
}

#[cfg(test)]
mod run_tests {
    use super::{run, Summary};
    use crate::bank::Bank;

    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[test]
    fn test_run() {
        let data = r#"type,account,id,amount,rate,tenure,actor,note
open,SB001,,500,,,,Asha
open,SB002,,0,,,,Ravi
cheque_issue,SB001,,,,,,100001
cheque_request,,1,1000,,,asha,Ravi
cheque_approve,,1,,,,manager,
credit,SB001,,600,,,,salary
cheque_draw,,1,,,,teller,
credit,SB002,,not-a-number,,,,
debit,SB002,,10,,,,
deposit_request,SB002,,75,,,ravi,counter 4
deposit_approve,,1,,,,manager,"#;
        let bank = Arc::new(Bank::default());
        let mut output = Vec::new();

        let summary = run(bank.clone(), std::io::Cursor::new(data), &mut output).unwrap();

        // The approval fails on funds but stays approved, so the draw after
        // the salary goes through.
        assert_eq!(Summary { malformed: 1, failed: 2 }, summary);
        let want = r#"account,holder,status,balance
SB001,Asha,ACTIVE,100.00
SB002,Ravi,ACTIVE,75.00
"#;
        assert_eq!(want, String::from_utf8(output).unwrap());
        assert_eq!(dec!(100), bank.account("SB001").unwrap().balance());
    }
}

use crate::ledger::account::{Account, AccountStatus};
use crate::ledger::journal::{EntryType, Transaction};
use crate::ledger::{round_money, AccountNumber, Amount};

use serde::Serialize;
use std::sync::mpsc::Receiver;

#[derive(Serialize)]
struct AccountRecord<'a> {
    account: &'a AccountNumber,
    holder: &'a str,
    status: AccountStatus,
    balance: Amount,
}

impl<'a> AccountRecord<'a> {
    fn new(acc: &'a Account) -> Self {
        Self {
            account: &acc.account_number,
            holder: &acc.holder.name,
            status: acc.status(),
            balance: round_money(acc.balance()),
        }
    }
}

#[derive(Serialize)]
struct JournalRecord<'a> {
    id: u64,
    transaction_id: &'a str,
    account: &'a AccountNumber,
    #[serde(rename = "type")]
    entry_type: EntryType,
    amount: Amount,
    balance: Amount,
    timestamp: String,
    description: &'a str,
}

impl<'a> JournalRecord<'a> {
    fn new(entry: &'a Transaction) -> Self {
        Self {
            id: entry.id,
            transaction_id: &entry.transaction_id,
            account: &entry.account_number,
            entry_type: entry.entry_type,
            amount: entry.amount,
            balance: entry.balance,
            timestamp: entry.timestamp.to_rfc3339(),
            description: &entry.description,
        }
    }
}

// Writes the received accounts to the given stream.
pub fn write(
    output_stream: impl std::io::Write,
    accounts: Receiver<Account>,
) -> Result<(), std::io::Error> {
    let mut writer = csv::Writer::from_writer(output_stream);

    for account in accounts {
        writer.serialize(AccountRecord::new(&account))?;
    }
    writer.flush()?;

    Ok(())
}

// Writes journal entries to the given stream, in the order given.
pub fn write_journal<'a>(
    output_stream: impl std::io::Write,
    entries: impl IntoIterator<Item = &'a Transaction>,
) -> Result<(), std::io::Error> {
    let mut writer = csv::Writer::from_writer(output_stream);

    for entry in entries {
        writer.serialize(JournalRecord::new(entry))?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod write_tests {
    use crate::bank::Bank;
    use crate::ledger::account::{AccountHolder, AccountStatus};

    use rust_decimal_macros::dec;
    use std::sync::mpsc;

    #[test]
    fn test_write_accounts() {
        let bank = Bank::default();
        let (accounts_tx, accounts) = mpsc::channel();
        let mut output_stream = Vec::new();
        for (number, holder, balance) in vec![
            ("SB001", "Asha", dec!(5.0)),
            ("SB002", "Ravi", dec!(1.234)),
            ("SB003", "Meera", dec!(0)),
        ] {
            bank.open_account(number, AccountHolder::new(holder), balance).unwrap();
        }
        bank.set_account_status("SB003", AccountStatus::Frozen).unwrap();
        for account in bank.accounts() {
            accounts_tx.send(account).unwrap();
        }
        drop(accounts_tx);

        super::write(&mut output_stream, accounts).unwrap();

        let want = r#"account,holder,status,balance
SB001,Asha,ACTIVE,5.00
SB002,Ravi,ACTIVE,1.23
SB003,Meera,FROZEN,0.00
"#;
        assert_eq!(want.to_string(), String::from_utf8(output_stream).unwrap());
    }

    #[test]
    fn test_write_journal() {
        let bank = Bank::default();
        bank.open_account("SB001", AccountHolder::new("Asha"), dec!(10)).unwrap();
        bank.debit("SB001", dec!(2.5), "coffee").unwrap();
        let mut output_stream = Vec::new();

        super::write_journal(&mut output_stream, &bank.journal()).unwrap();

        let output = String::from_utf8(output_stream).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            "id,transaction_id,account,type,amount,balance,timestamp,description",
            lines[0]
        );
        assert_eq!(3, lines.len());
        assert!(lines[1].starts_with("1,TXN"));
        assert!(lines[1].contains(",SB001,Credit,10.00,10.00,"));
        assert!(lines[2].contains(",SB001,Debit,-2.50,7.50,"));
        assert!(lines[2].ends_with(",coffee"));
    }
}

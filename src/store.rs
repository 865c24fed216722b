//! In-process persistence.
//!
//! Tables are kept behind a single lock. A unit of work holds that lock for
//! its whole duration, which gives serializable isolation, and keeps a
//! before-image of every row it touches. Committing forgets the images;
//! anything else (an error, a panic) puts them back.

use crate::error::{BankError, Result};
use crate::instruments::{
    cheque::Cheque, deposit_request::DepositRequest, fixed_deposit::FixedDeposit,
    gold_loan::GoldLoan, investment::Investment, loan::EmiPayment, loan::Loan,
    subsidy::SubsidyClaim, Instrument,
};
use crate::ledger::{account::Account, journal::Journal, AccountNumber, InstrumentId};

use parking_lot::{Mutex, MutexGuard};
use std::borrow::Borrow;
use std::collections::BTreeMap;

/// Rows keyed by `K`, plus the undo log of the unit of work in progress.
#[derive(Debug)]
pub(crate) struct Table<K, V> {
    rows: BTreeMap<K, V>,
    last_id: u64,
    undo: Vec<(K, Option<V>)>,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
            undo: Vec::new(),
        }
    }
}

impl<K: Ord + Clone, V: Clone> Table<K, V> {
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.rows.get(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.rows.contains_key(key)
    }

    /// Mutable access to a row. Its current value is saved first so the
    /// change can be undone.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (owned, before) = self
            .rows
            .get_key_value(key)
            .map(|(owned, row)| (owned.clone(), row.clone()))?;
        self.undo.push((owned.clone(), Some(before)));
        self.rows.get_mut::<K>(&owned)
    }

    pub fn insert(&mut self, key: K, value: V) {
        let before = self.rows.get(&key).cloned();
        self.undo.push((key.clone(), before));
        self.rows.insert(key, value);
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Next surrogate key. Like a database sequence, it is not given back on
    /// rollback.
    pub fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn commit(&mut self) {
        self.undo.clear();
    }

    fn rollback(&mut self) {
        // Newest first, so the oldest image of a row is the one left standing.
        while let Some((key, before)) = self.undo.pop() {
            match before {
                Some(value) => self.rows.insert(key, value),
                None => self.rows.remove(&key),
            };
        }
    }
}

impl<V: Instrument + Clone> Table<InstrumentId, V> {
    pub fn find(&self, id: InstrumentId) -> Result<&V> {
        self.get(&id).ok_or(BankError::InstrumentNotFound {
            instrument: V::KIND,
            id,
        })
    }

    pub fn find_mut(&mut self, id: InstrumentId) -> Result<&mut V> {
        self.get_mut(&id).ok_or(BankError::InstrumentNotFound {
            instrument: V::KIND,
            id,
        })
    }

    pub fn for_account<'a>(&'a self, account_number: &'a str) -> impl Iterator<Item = &'a V> + 'a {
        self.values()
            .filter(move |row| row.account_number() == account_number)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub accounts: Table<AccountNumber, Account>,
    pub journal: Journal,
    pub cheques: Table<InstrumentId, Cheque>,
    pub fixed_deposits: Table<InstrumentId, FixedDeposit>,
    pub loans: Table<InstrumentId, Loan>,
    pub emi_payments: Table<InstrumentId, EmiPayment>,
    pub deposit_requests: Table<InstrumentId, DepositRequest>,
    pub investments: Table<InstrumentId, Investment>,
    pub gold_loans: Table<InstrumentId, GoldLoan>,
    pub subsidy_claims: Table<InstrumentId, SubsidyClaim>,
}

impl Tables {
    pub(crate) fn commit(&mut self) {
        self.accounts.commit();
        self.journal.commit();
        self.cheques.commit();
        self.fixed_deposits.commit();
        self.loans.commit();
        self.emi_payments.commit();
        self.deposit_requests.commit();
        self.investments.commit();
        self.gold_loans.commit();
        self.subsidy_claims.commit();
    }

    pub(crate) fn rollback(&mut self) {
        self.accounts.rollback();
        self.journal.rollback();
        self.cheques.rollback();
        self.fixed_deposits.rollback();
        self.loans.rollback();
        self.emi_payments.rollback();
        self.deposit_requests.rollback();
        self.investments.rollback();
        self.gold_loans.rollback();
        self.subsidy_claims.rollback();
    }
}

/// Holds the store lock; rolls back on drop unless committed.
struct UnitOfWork<'a> {
    tables: MutexGuard<'a, Tables>,
    committed: bool,
}

impl UnitOfWork<'_> {
    fn commit(&mut self) {
        self.tables.commit();
        self.committed = true;
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.tables.rollback();
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Database {
    tables: Mutex<Tables>,
}

impl Database {
    /// Run `work` as one atomic unit: either everything it changed is kept,
    /// or nothing is.
    pub fn transaction<T>(&self, work: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut unit = UnitOfWork {
            tables: self.tables.lock(),
            committed: false,
        };

        let value = work(&mut unit.tables)?;
        unit.commit();

        Ok(value)
    }

    pub fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> T {
        query(&self.tables.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::{Database, Table};
    use crate::error::BankError;
    use crate::ledger::account::{Account, AccountHolder};
    use crate::ledger::{self, journal};

    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::panic::{self, AssertUnwindSafe};

    fn open(db: &Database, number: &str, amount: rust_decimal::Decimal) {
        db.transaction(|tables| {
            tables.accounts.insert(
                number.to_string(),
                Account::new(number.to_string(), AccountHolder::new("Dev"), Utc::now()),
            );
            journal::post(tables, Utc::now(), number, journal::EntryType::Credit, amount, "open")
        })
        .unwrap();
    }

    #[test]
    fn test_table_rollback_restores_oldest_image() {
        let mut table: Table<u64, &str> = Table::default();
        table.insert(1, "a");
        table.commit();

        *table.get_mut(&1).unwrap() = "b";
        *table.get_mut(&1).unwrap() = "c";
        table.insert(2, "new");
        table.rollback();

        assert_eq!(Some(&"a"), table.get(&1));
        assert_eq!(None, table.get(&2));
        assert_eq!(1, table.len());
    }

    #[test]
    fn test_next_id_is_not_reused() {
        let mut table: Table<u64, ()> = Table::default();
        assert_eq!(1, table.next_id());
        table.rollback();
        assert_eq!(2, table.next_id());
    }

    #[test]
    fn test_get_mut_by_borrowed_key() {
        let mut table: Table<String, u32> = Table::default();
        table.insert("SB001".to_string(), 1);
        table.commit();

        *table.get_mut("SB001").unwrap() += 1;
        assert_eq!(Some(&2), table.get("SB001"));
        assert_eq!(None, table.get_mut("SB002"));

        table.rollback();
        assert_eq!(Some(&1), table.get("SB001"));
    }

    #[test]
    fn test_transaction_commits() {
        let db = Database::default();
        open(&db, "ACC1", dec!(50));

        db.read(|tables| {
            assert_eq!(dec!(50), tables.accounts.get("ACC1").unwrap().balance());
            assert_eq!(1, tables.journal.len());
        });
    }

    #[test]
    // A failure after the balance moved must undo the balance change too.
    fn test_transaction_rolls_back_on_error() {
        let db = Database::default();
        open(&db, "ACC1", dec!(50));

        let got: Result<(), BankError> = db.transaction(|tables| {
            ledger::debit(&mut tables.accounts, "ACC1", dec!(20))?;
            Err(BankError::validation("later step failed"))
        });
        assert!(got.is_err());

        db.read(|tables| {
            assert_eq!(dec!(50), tables.accounts.get("ACC1").unwrap().balance());
            assert_eq!(1, tables.journal.len());
        });
    }

    #[test]
    fn test_transaction_rolls_back_on_panic() {
        let db = Database::default();
        open(&db, "ACC1", dec!(50));

        let got = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), BankError> = db.transaction(|tables| {
                journal::post(tables, Utc::now(), "ACC1", journal::EntryType::Debit, dec!(20), "x")?;
                panic!("boom");
            });
        }));
        assert!(got.is_err());

        db.read(|tables| {
            assert_eq!(dec!(50), tables.accounts.get("ACC1").unwrap().balance());
            assert_eq!(1, tables.journal.len());
        });
    }
}

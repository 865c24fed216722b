use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;

/// Where the bank gets "now" from. Business dates (maturity, interest
/// months, EMI due dates) are derived from it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    /// Midnight UTC on the given day.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock() = at;
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock};
    use chrono::{Duration, NaiveDate};

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(), clock.today());

        clock.advance(Duration::days(1));
        assert_eq!(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), clock.today());

        clock.set_date(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
        assert_eq!(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(), clock.today());
    }
}

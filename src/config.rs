//! Rates, ratios and limits used by the instruments.
//!
//! Defaults are what a branch would run with. Every value can be overridden
//! from a `BANK_*` environment variable through [`BankConfig::from_env`].

use crate::error::{BankError, Result};
use crate::instruments::loan::LoanKind;
use crate::ledger::Amount;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedDepositConfig {
    /// Annual rate, in percent, when the customer does not negotiate one.
    pub default_rate: Decimal,
    pub minimum_principal: Amount,
    pub min_tenure_months: u32,
    pub max_tenure_months: u32,
}

impl Default for FixedDepositConfig {
    fn default() -> Self {
        Self {
            default_rate: dec!(6.5),
            minimum_principal: dec!(1000),
            min_tenure_months: 6,
            max_tenure_months: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanConfig {
    pub personal_rate: Decimal,
    pub home_rate: Decimal,
    pub vehicle_rate: Decimal,
    pub education_rate: Decimal,
    pub max_tenure_months: u32,
}

impl LoanConfig {
    pub fn rate_for(&self, kind: LoanKind) -> Decimal {
        match kind {
            LoanKind::Personal => self.personal_rate,
            LoanKind::Home => self.home_rate,
            LoanKind::Vehicle => self.vehicle_rate,
            LoanKind::Education => self.education_rate,
        }
    }
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            personal_rate: dec!(10.5),
            home_rate: dec!(8.5),
            vehicle_rate: dec!(9.0),
            education_rate: dec!(9.5),
            max_tenure_months: 360,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldLoanConfig {
    /// Price of one gram of 24 karat gold.
    pub rate_per_gram: Amount,
    /// Share of the gold value that can be lent, between 0 and 1.
    pub loan_to_value: Decimal,
    pub interest_rate: Decimal,
    pub tenure_months: u32,
}

impl Default for GoldLoanConfig {
    fn default() -> Self {
        Self {
            rate_per_gram: dec!(6000),
            loan_to_value: dec!(0.75),
            interest_rate: dec!(9.0),
            tenure_months: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsidyConfig {
    /// The subsidy is the interest of the first `projection_periods` months
    /// of a loan repaid over `notional_tenure_months`.
    pub notional_tenure_months: u32,
    pub projection_periods: u32,
    pub min_age: u32,
    pub max_age: u32,
    pub family_income_ceiling: Amount,
    pub max_claims_per_account: usize,
}

impl Default for SubsidyConfig {
    fn default() -> Self {
        Self {
            notional_tenure_months: 120,
            projection_periods: 36,
            min_age: 16,
            max_age: 35,
            family_income_ceiling: dec!(450000),
            max_claims_per_account: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between two settlement runs of a started scheduler.
    pub cadence_secs: u64,
    /// Also pay out deposits whose maturity date has passed.
    pub sweep_maturities: bool,
}

impl SchedulerConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cadence_secs: 24 * 60 * 60,
            sweep_maturities: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    pub fixed_deposit: FixedDepositConfig,
    pub loans: LoanConfig,
    pub gold: GoldLoanConfig,
    pub subsidy: SubsidyConfig,
    pub scheduler: SchedulerConfig,
}

impl BankConfig {
    /// Defaults, overridden by whatever `BANK_*` variables are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let fd = &mut config.fixed_deposit;
        read(&lookup, "BANK_FD_DEFAULT_RATE", &mut fd.default_rate)?;
        read(&lookup, "BANK_FD_MINIMUM_PRINCIPAL", &mut fd.minimum_principal)?;
        read(&lookup, "BANK_FD_MIN_TENURE_MONTHS", &mut fd.min_tenure_months)?;
        read(&lookup, "BANK_FD_MAX_TENURE_MONTHS", &mut fd.max_tenure_months)?;

        let loans = &mut config.loans;
        read(&lookup, "BANK_LOAN_PERSONAL_RATE", &mut loans.personal_rate)?;
        read(&lookup, "BANK_LOAN_HOME_RATE", &mut loans.home_rate)?;
        read(&lookup, "BANK_LOAN_VEHICLE_RATE", &mut loans.vehicle_rate)?;
        read(&lookup, "BANK_LOAN_EDUCATION_RATE", &mut loans.education_rate)?;
        read(&lookup, "BANK_LOAN_MAX_TENURE_MONTHS", &mut loans.max_tenure_months)?;

        let gold = &mut config.gold;
        read(&lookup, "BANK_GOLD_RATE_PER_GRAM", &mut gold.rate_per_gram)?;
        read(&lookup, "BANK_GOLD_LOAN_TO_VALUE", &mut gold.loan_to_value)?;
        read(&lookup, "BANK_GOLD_INTEREST_RATE", &mut gold.interest_rate)?;
        read(&lookup, "BANK_GOLD_TENURE_MONTHS", &mut gold.tenure_months)?;

        let subsidy = &mut config.subsidy;
        read(&lookup, "BANK_SUBSIDY_NOTIONAL_TENURE_MONTHS", &mut subsidy.notional_tenure_months)?;
        read(&lookup, "BANK_SUBSIDY_PROJECTION_PERIODS", &mut subsidy.projection_periods)?;
        read(&lookup, "BANK_SUBSIDY_MIN_AGE", &mut subsidy.min_age)?;
        read(&lookup, "BANK_SUBSIDY_MAX_AGE", &mut subsidy.max_age)?;
        read(&lookup, "BANK_SUBSIDY_INCOME_CEILING", &mut subsidy.family_income_ceiling)?;
        read(&lookup, "BANK_SUBSIDY_MAX_CLAIMS", &mut subsidy.max_claims_per_account)?;

        let scheduler = &mut config.scheduler;
        read(&lookup, "BANK_SCHEDULER_CADENCE_SECS", &mut scheduler.cadence_secs)?;
        read(&lookup, "BANK_SCHEDULER_SWEEP_MATURITIES", &mut scheduler.sweep_maturities)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fixed_deposit.min_tenure_months == 0
            || self.fixed_deposit.min_tenure_months > self.fixed_deposit.max_tenure_months
        {
            return Err(BankError::validation("fixed deposit tenure bounds are inconsistent"));
        }
        if self.gold.loan_to_value <= Decimal::ZERO || self.gold.loan_to_value > Decimal::ONE {
            return Err(BankError::validation("gold loan-to-value must be in (0, 1]"));
        }
        if self.subsidy.projection_periods > self.subsidy.notional_tenure_months {
            return Err(BankError::validation(
                "subsidy projection cannot be longer than its notional tenure",
            ));
        }
        if self.subsidy.min_age > self.subsidy.max_age {
            return Err(BankError::validation("subsidy age range is inverted"));
        }
        if self.scheduler.cadence_secs == 0 {
            return Err(BankError::validation("scheduler cadence must be at least one second"));
        }

        Ok(())
    }
}

fn read<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<()> {
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| BankError::validation(format!("{} has an invalid value {:?}", key, raw)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::BankConfig;
    use crate::error::BankError;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(Ok(()), BankConfig::default().validate());
    }

    #[test]
    fn test_overrides() {
        let vars = HashMap::from([
            ("BANK_FD_DEFAULT_RATE", "7.25"),
            ("BANK_GOLD_LOAN_TO_VALUE", " 0.8 "),
            ("BANK_SCHEDULER_SWEEP_MATURITIES", "true"),
            ("BANK_SCHEDULER_CADENCE_SECS", "900"),
        ]);
        let config = BankConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(dec!(7.25), config.fixed_deposit.default_rate);
        assert_eq!(dec!(0.8), config.gold.loan_to_value);
        assert!(config.scheduler.sweep_maturities);
        assert_eq!(Duration::from_secs(900), config.scheduler.cadence());
        assert_eq!(120, config.subsidy.notional_tenure_months);
    }

    #[test]
    fn test_invalid_overrides() {
        for (key, value) in vec![
            ("BANK_FD_DEFAULT_RATE", "seven"),
            ("BANK_GOLD_LOAN_TO_VALUE", "1.5"),
            ("BANK_SUBSIDY_MIN_AGE", "99"),
            ("BANK_SCHEDULER_CADENCE_SECS", "0"),
        ] {
            let got = BankConfig::from_lookup(|k| (k == key).then(|| value.to_string()));
            assert!(matches!(got, Err(BankError::ValidationFailed(_))), "{}", key);
        }
    }
}

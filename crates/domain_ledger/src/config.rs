//! Ledger engine configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{BusinessClock, Currency, Timezone};

use crate::bill::BillNumberFormat;

/// What a reversal does when the physical inventory cannot be fully restored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationPolicy {
    /// Log and report the shortfall, then commit
    #[default]
    Lenient,
    /// Fail the reversal and roll back
    Strict,
}

impl FromStr for ReconciliationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(ReconciliationPolicy::Lenient),
            "strict" => Ok(ReconciliationPolicy::Strict),
            other => Err(format!("Unknown reconciliation policy: {}", other)),
        }
    }
}

/// Runtime settings of the ledger engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub currency: Currency,
    pub clock: BusinessClock,
    pub b2b_bills: BillNumberFormat,
    pub b2c_bills: BillNumberFormat,
    pub reconciliation: ReconciliationPolicy,
    pub default_void_reason: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency: Currency::PKR,
            clock: BusinessClock::new(Timezone::default()),
            b2b_bills: BillNumberFormat::new("BILL-", 4),
            b2c_bills: BillNumberFormat::new("B2C-", 4),
            reconciliation: ReconciliationPolicy::Lenient,
            default_void_reason: "Transaction voided".to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_timezone(mut self, timezone: Timezone) -> Self {
        self.clock = BusinessClock::new(timezone);
        self
    }

    pub fn with_reconciliation(mut self, policy: ReconciliationPolicy) -> Self {
        self.reconciliation = policy;
        self
    }

    pub fn with_bill_format(mut self, b2b: BillNumberFormat, b2c: BillNumberFormat) -> Self {
        self.b2b_bills = b2b;
        self.b2c_bills = b2c;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("STRICT".parse::<ReconciliationPolicy>().unwrap(), ReconciliationPolicy::Strict);
        assert_eq!(" lenient ".parse::<ReconciliationPolicy>().unwrap(), ReconciliationPolicy::Lenient);
        assert!("loose".parse::<ReconciliationPolicy>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.currency, Currency::PKR);
        assert_eq!(config.reconciliation, ReconciliationPolicy::Lenient);
        assert_eq!(config.default_void_reason, "Transaction voided");
    }
}

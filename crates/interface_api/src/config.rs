//! API configuration

use serde::Deserialize;

use core_kernel::{Currency, Timezone};
use domain_ledger::{BillNumberFormat, LedgerConfig, ReconciliationPolicy};

/// API configuration
///
/// Every field can be set through an `API_`-prefixed environment variable,
/// e.g. `API_PORT=9090` or `API_RECONCILIATION=strict`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Maximum pooled database connections
    pub max_connections: u32,
    /// Log level
    pub log_level: String,
    /// Ledger currency code
    pub currency: String,
    /// IANA name of the business timezone
    pub timezone: String,
    /// Bill number prefix of B2B transactions
    pub b2b_bill_prefix: String,
    /// Bill number prefix of B2C transactions
    pub b2c_bill_prefix: String,
    /// Digits of the per-day bill counter
    pub bill_width: usize,
    /// `lenient` or `strict`
    pub reconciliation: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/lpg_ledger".to_string(),
            max_connections: 10,
            log_level: "info".to_string(),
            currency: "PKR".to_string(),
            timezone: "Asia/Karachi".to_string(),
            b2b_bill_prefix: "BILL-".to_string(),
            b2c_bill_prefix: "B2C-".to_string(),
            bill_width: 4,
            reconciliation: "lenient".to_string(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The ledger engine settings described by this configuration
    pub fn ledger_config(&self) -> Result<LedgerConfig, config::ConfigError> {
        let currency: Currency = self
            .currency
            .parse()
            .map_err(|e: core_kernel::MoneyError| config::ConfigError::Message(e.to_string()))?;
        let timezone: Timezone = self
            .timezone
            .parse()
            .map_err(|e: core_kernel::TemporalError| config::ConfigError::Message(e.to_string()))?;
        let policy: ReconciliationPolicy = self
            .reconciliation
            .parse()
            .map_err(config::ConfigError::Message)?;
        if self.bill_width == 0 {
            return Err(config::ConfigError::Message("bill_width must be positive".to_string()));
        }

        Ok(LedgerConfig::default()
            .with_currency(currency)
            .with_timezone(timezone)
            .with_reconciliation(policy)
            .with_bill_format(
                BillNumberFormat::new(&self.b2b_bill_prefix, self.bill_width),
                BillNumberFormat::new(&self.b2c_bill_prefix, self.bill_width),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_map_to_default_ledger() {
        let ledger = ApiConfig::default().ledger_config().unwrap();
        assert_eq!(ledger, LedgerConfig::default());
    }

    #[test]
    fn test_strict_policy_and_currency() {
        let config = ApiConfig {
            currency: "aed".to_string(),
            timezone: "Asia/Dubai".to_string(),
            reconciliation: "strict".to_string(),
            ..ApiConfig::default()
        };
        let ledger = config.ledger_config().unwrap();
        assert_eq!(ledger.currency, Currency::AED);
        assert_eq!(ledger.reconciliation, ReconciliationPolicy::Strict);
        assert_eq!(ledger.clock.timezone().name(), "Asia/Dubai");
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let bad_zone = ApiConfig {
            timezone: "Mars/Olympus".to_string(),
            ..ApiConfig::default()
        };
        assert!(bad_zone.ledger_config().is_err());

        let bad_width = ApiConfig {
            bill_width: 0,
            ..ApiConfig::default()
        };
        assert!(bad_width.ledger_config().is_err());
    }
}

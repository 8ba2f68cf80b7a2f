use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Rate;
use crate::storage::{OFFERS_KEY, REQUESTS_KEY};

/// Ledger settings. Every field has a default, so a config file only needs
/// the values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Store key of the offers collection
    pub offers_key: String,
    /// Store key of the requests collection
    pub requests_key: String,
    /// Write demonstration entries when the store is empty
    pub seed_demo_data: bool,
    /// Interest rate (%) of loans created by funding a request
    pub fulfillment_interest_rate: Rate,
    /// Duration of loans created by funding a request
    pub fulfillment_duration_days: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            offers_key: OFFERS_KEY.to_string(),
            requests_key: REQUESTS_KEY.to_string(),
            seed_demo_data: true,
            fulfillment_interest_rate: Decimal::from(5),
            fulfillment_duration_days: 30,
        }
    }
}

impl LedgerConfig {
    /// Read a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn without_seed(mut self) -> Self {
        self.seed_demo_data = false;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.offers_key.trim().is_empty() || self.requests_key.trim().is_empty() {
            return Err("Store keys must not be empty".to_string());
        }
        if self.offers_key == self.requests_key {
            return Err("Offers and requests must use different store keys".to_string());
        }
        let rate = self.fulfillment_interest_rate;
        if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
            return Err(format!(
                "Fulfillment interest rate must be between 0 and 100, got {}",
                rate
            ));
        }
        if self.fulfillment_duration_days < 1 {
            return Err("Fulfillment duration must be at least one day".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rust_decimal_macros::dec;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LedgerConfig::default();
        assert_eq!(config.fulfillment_interest_rate, dec!(5));
        assert_eq!(config.fulfillment_duration_days, 30);
        assert!(config.seed_demo_data);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = LedgerConfig::default();
        config.fulfillment_interest_rate = dec!(101);
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.fulfillment_duration_days = 0;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.requests_key = config.offers_key.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_file_keeps_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"{{"fulfillment_interest_rate": "8.5", "seed_demo_data": false}}"#)?;

        let config = LedgerConfig::from_json_file(file.path())?;
        assert_eq!(config.fulfillment_interest_rate, dec!(8.5));
        assert!(!config.seed_demo_data);
        assert_eq!(config.fulfillment_duration_days, 30);
        assert_eq!(config.offers_key, OFFERS_KEY);
        Ok(())
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Environment variable naming the SQLite file used by the binary.
pub const DB_PATH_ENV: &str = "INVOICE_LEDGER_DB";
pub const DEFAULT_DB_PATH: &str = "invoice_ledger.db";

/// Business preferences, persisted as one JSON document in the `settings` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Fraction applied to the subtotal, e.g. 0.15 for 15%.
    pub tax_rate: Decimal,
    pub business_name: String,
    pub business_email: String,
    pub business_address: Option<String>,
    pub remote: Option<RemoteSettings>,
}

/// Endpoint of the optional remote mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    pub url: String,
    pub api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tax_rate: Decimal::new(15, 2),
            business_name: "Your Business".to_string(),
            business_email: "contact@yourbusiness.com".to_string(),
            business_address: None,
            remote: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE {
            return Err(LedgerError::validation(format!(
                "tax rate must be between 0 and 1, got {}",
                self.tax_rate
            )));
        }
        if self.business_name.trim().is_empty() {
            return Err(LedgerError::validation("business name is required"));
        }
        if let Some(remote) = &self.remote {
            if remote.url.trim().is_empty() {
                return Err(LedgerError::validation("remote url is required when remote sync is configured"));
            }
        }
        Ok(())
    }
}

/// Database path from the environment, falling back to the working directory.
pub fn db_path_from_env() -> String {
    std::env::var(DB_PATH_ENV).unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
}

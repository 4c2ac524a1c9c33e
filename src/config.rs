// ⚙️ Filer Configuration
//
// Agency-issued identifiers and statutory thresholds, passed explicitly to
// every generator. Loaded from a JSON file, never from process globals.

use crate::entities::Address;
use anyhow::{anyhow, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitterConfig {
    /// Transmitter TIN
    pub tin: String,

    /// Transmitter control code issued by the tax authority (5 chars)
    pub control_code: String,

    pub name: String,
    pub address: Address,

    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum yearly compensation (cents) that must be reported
    #[serde(default = "default_nec_minimum")]
    pub nec_minimum_cents: i64,

    /// Minimum yearly gross income (cents) for foreign withholding statements
    #[serde(default = "default_withholding_minimum")]
    pub withholding_minimum_cents: i64,
}

fn default_nec_minimum() -> i64 {
    60_000
}

fn default_withholding_minimum() -> i64 {
    1_000
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            nec_minimum_cents: default_nec_minimum(),
            withholding_minimum_cents: default_withholding_minimum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilerConfig {
    pub transmitter: TransmitterConfig,

    /// Residency that makes a recipient "domestic"
    #[serde(default = "default_filing_country")]
    pub filing_country_code: String,

    #[serde(default)]
    pub thresholds: Thresholds,
}

fn default_filing_country() -> String {
    "US".to_string()
}

impl FilerConfig {
    pub fn new(transmitter: TransmitterConfig) -> Self {
        FilerConfig {
            transmitter,
            filing_country_code: default_filing_country(),
            thresholds: Thresholds::default(),
        }
    }

    /// Load and validate config from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read filer config: {:?}", path.as_ref()))?;

        let config: FilerConfig =
            serde_json::from_str(&content).context("Failed to parse filer config JSON")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let tin_digits = self.transmitter.tin.chars().filter(|c| c.is_ascii_digit()).count();
        if tin_digits != 9 {
            return Err(anyhow!(
                "transmitter TIN must have 9 digits, got {}",
                tin_digits
            ));
        }

        if self.transmitter.control_code.trim().len() != 5 {
            return Err(anyhow!(
                "transmitter control code must be 5 characters, got {:?}",
                self.transmitter.control_code
            ));
        }

        if self.thresholds.nec_minimum_cents < 0 || self.thresholds.withholding_minimum_cents < 0 {
            return Err(anyhow!("reporting thresholds cannot be negative"));
        }

        Ok(())
    }
}

//! Runtime settings, read from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `DELIVERYNOTE_TAX_ROUNDING` | `document` |
//! | `DELIVERYNOTE_SEQUENCE_START` | `1` |
//! | `DELIVERYNOTE_COMPANY_NAME` | `Company` |
//! | `DELIVERYNOTE_AMOUNT_WORDS` | `es` |
//! | `DELIVERYNOTE_CURRENCY` | `USD` (2 digits) |
//! | `BIND_ADDR` | `0.0.0.0:8080` |

use thiserror::Error;

use deliverynote_core::{Currency, DEFAULT_CURRENCY_DIGITS};
use deliverynote_taxes::TaxRounding;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Language used to spell out the total on the printed note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountWords {
    Spanish,
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub tax_rounding: TaxRounding,
    pub sequence_start: u64,
    pub company_name: String,
    pub amount_words: AmountWords,
    pub default_currency: Currency,
    pub bind_addr: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            tax_rounding: TaxRounding::Document,
            sequence_start: 1,
            company_name: "Company".to_string(),
            amount_words: AmountWords::Spanish,
            default_currency: Currency::default(),
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl DeliveryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(raw) = get("DELIVERYNOTE_TAX_ROUNDING") {
            cfg.tax_rounding = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "DELIVERYNOTE_TAX_ROUNDING",
                message: format!("{e}"),
            })?;
        }

        if let Some(raw) = get("DELIVERYNOTE_SEQUENCE_START") {
            cfg.sequence_start = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "DELIVERYNOTE_SEQUENCE_START",
                message: format!("{e}"),
            })?;
        }

        if let Some(raw) = get("DELIVERYNOTE_COMPANY_NAME") {
            cfg.company_name = raw.trim().to_string();
        }

        if let Some(raw) = get("DELIVERYNOTE_AMOUNT_WORDS") {
            cfg.amount_words = match raw.trim().to_ascii_lowercase().as_str() {
                "es" => AmountWords::Spanish,
                "off" | "none" => AmountWords::Off,
                other => {
                    return Err(ConfigError::Invalid {
                        var: "DELIVERYNOTE_AMOUNT_WORDS",
                        message: format!("unsupported language {other:?}"),
                    });
                }
            };
        }

        if let Some(raw) = get("DELIVERYNOTE_CURRENCY") {
            cfg.default_currency =
                Currency::new(raw.trim(), DEFAULT_CURRENCY_DIGITS).map_err(|e| ConfigError::Invalid {
                    var: "DELIVERYNOTE_CURRENCY",
                    message: e.to_string(),
                })?;
        }

        if let Some(raw) = get("BIND_ADDR") {
            cfg.bind_addr = raw.trim().to_string();
        }

        Ok(cfg)
    }
}

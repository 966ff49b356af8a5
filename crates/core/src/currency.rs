//! Currency precision and rounding.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Digits used when a document has no currency information.
pub const DEFAULT_CURRENCY_DIGITS: u32 = 2;

const MAX_CURRENCY_DIGITS: u32 = 6;

/// Currency of a document: ISO code plus the number of decimal places amounts
/// are rounded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    code: String,
    digits: u32,
}

impl ValueObject for Currency {}

impl Default for Currency {
    fn default() -> Self {
        Self {
            code: "USD".to_string(),
            digits: DEFAULT_CURRENCY_DIGITS,
        }
    }
}

impl Currency {
    pub fn new(code: impl Into<String>, digits: u32) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("currency code cannot be empty"));
        }
        if digits > MAX_CURRENCY_DIGITS {
            return Err(DomainError::validation(format!(
                "currency digits must be at most {MAX_CURRENCY_DIGITS}"
            )));
        }
        Ok(Self {
            code: code.trim().to_uppercase(),
            digits,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// Round an amount to the currency precision, ties to even.
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.digits, RoundingStrategy::MidpointNearestEven)
    }
}

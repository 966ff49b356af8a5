use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use deliverynote_core::{Currency, DomainError};

use crate::tax::{Tax, TaxId, compute};

/// When tax buckets are rounded to the currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxRounding {
    /// Round every bucket once, after all lines.
    #[default]
    Document,
    /// Round every bucket after each line.
    Line,
}

impl core::str::FromStr for TaxRounding {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(TaxRounding::Document),
            "line" => Ok(TaxRounding::Line),
            other => Err(DomainError::validation(format!(
                "unknown tax rounding '{other}' (expected 'document' or 'line')"
            ))),
        }
    }
}

/// Folds the taxes of a document's lines into one bucket per tax.
#[derive(Debug, Clone)]
pub struct TaxAccumulator<'a> {
    currency: &'a Currency,
    rounding: TaxRounding,
    buckets: BTreeMap<TaxId, Decimal>,
}

impl<'a> TaxAccumulator<'a> {
    pub fn new(currency: &'a Currency, rounding: TaxRounding) -> Self {
        Self {
            currency,
            rounding,
            buckets: BTreeMap::new(),
        }
    }

    pub fn add_line(&mut self, taxes: &[Tax], unit_price: Decimal, quantity: Decimal) {
        for line in compute(taxes, unit_price, quantity) {
            *self.buckets.entry(line.tax_id).or_insert(Decimal::ZERO) += line.amount;
        }
        if self.rounding == TaxRounding::Line {
            self.round_buckets();
        }
    }

    /// Bucket amounts per tax; rounded once `finish` has run in document mode.
    pub fn buckets(&self) -> &BTreeMap<TaxId, Decimal> {
        &self.buckets
    }

    /// Final tax amount: the sum of all buckets.
    pub fn finish(mut self) -> Decimal {
        if self.rounding == TaxRounding::Document {
            self.round_buckets();
        }
        self.buckets.values().copied().sum()
    }

    fn round_buckets(&mut self) {
        for amount in self.buckets.values_mut() {
            *amount = self.currency.round(*amount);
        }
    }
}

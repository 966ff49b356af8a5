use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use deliverynote_core::{DomainError, DomainResult, Entity};

deliverynote_core::domain_id!(
    /// Tax identifier.
    TaxId
);

/// Largest percentage rate a tax accepts (`10` is 1000%).
pub const MAX_TAX_RATE: i64 = 10;

/// Largest absolute per-unit amount of a fixed tax.
pub const MAX_FIXED_TAX_AMOUNT: i64 = 1_000_000_000_000;

/// How a tax amount is derived from a unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum TaxKind {
    /// Fraction of the unit price (`0.12` is 12%).
    Percentage { rate: Decimal },
    /// Fixed amount per unit.
    Fixed { amount: Decimal },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tax {
    pub id: TaxId,
    pub name: String,
    pub kind: TaxKind,
}

impl Entity for Tax {
    type Id = TaxId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Tax {
    pub fn percentage(id: TaxId, name: impl Into<String>, rate: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            kind: TaxKind::Percentage { rate },
        }
    }

    pub fn fixed(id: TaxId, name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            kind: TaxKind::Fixed { amount },
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("tax name cannot be empty"));
        }
        match self.kind {
            TaxKind::Percentage { rate } => {
                if rate.is_sign_negative() {
                    return Err(DomainError::validation("tax rate cannot be negative"));
                }
                if rate > Decimal::from(MAX_TAX_RATE) {
                    return Err(DomainError::validation(format!(
                        "tax rate {rate} is out of range"
                    )));
                }
            }
            TaxKind::Fixed { amount } => {
                if amount.abs() > Decimal::from(MAX_FIXED_TAX_AMOUNT) {
                    return Err(DomainError::validation(format!(
                        "fixed tax amount {amount} is out of range"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Rate of a percentage tax, `None` for fixed amounts.
    pub fn rate(&self) -> Option<Decimal> {
        match self.kind {
            TaxKind::Percentage { rate } => Some(rate),
            TaxKind::Fixed { .. } => None,
        }
    }

    fn unit_amount(&self, unit_price: Decimal) -> Decimal {
        match self.kind {
            TaxKind::Percentage { rate } => unit_price * rate,
            TaxKind::Fixed { amount } => amount,
        }
    }
}

/// One computed tax for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLine {
    pub tax_id: TaxId,
    pub base: Decimal,
    pub amount: Decimal,
}

/// Compute the taxes of `quantity` units at `unit_price`.
///
/// Amounts are unrounded; rounding belongs to the caller's
/// [`TaxAccumulator`](crate::TaxAccumulator).
pub fn compute(taxes: &[Tax], unit_price: Decimal, quantity: Decimal) -> Vec<TaxLine> {
    taxes
        .iter()
        .map(|tax| TaxLine {
            tax_id: tax.id,
            base: unit_price * quantity,
            amount: tax.unit_amount(unit_price) * quantity,
        })
        .collect()
}

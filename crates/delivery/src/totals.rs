use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use deliverynote_core::Currency;
use deliverynote_taxes::{TaxAccumulator, TaxRounding};

use crate::line::{DeliveryLine, LineType};

/// Untaxed, tax and total amounts of a delivery, in its currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTotals {
    pub untaxed: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl DeliveryTotals {
    pub fn compute(lines: &[DeliveryLine], currency: &Currency, rounding: TaxRounding) -> Self {
        let mut untaxed = Decimal::ZERO;
        let mut taxes = TaxAccumulator::new(currency, rounding);

        for line in lines {
            if line.line_type != LineType::Line {
                continue;
            }
            untaxed += line.amount(currency);
            taxes.add_line(&line.taxes, line.unit_price, line.quantity);
        }

        let untaxed = currency.round(untaxed);
        let tax = currency.round(taxes.finish());
        Self {
            untaxed,
            tax,
            total: currency.round(untaxed + tax),
        }
    }
}

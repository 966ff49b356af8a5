use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use deliverynote_delivery::{Delivery, DeliveryId, DeliveryStatus, DeliveryTotals};
use deliverynote_parties::Party;

use crate::words::NumberToWords;

/// Tax rates (in percent) the printed note breaks the lines down by.
const SUBTOTAL_RATES: [i64; 3] = [0, 12, 14];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLine {
    pub line_no: u32,
    pub description: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDelivery {
    pub id: DeliveryId,
    pub number: Option<String>,
    pub status: DeliveryStatus,
    pub party_name: Option<String>,
    pub party_lang: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub comment: Option<String>,
    pub currency: Option<String>,
    pub lines: Vec<ReportLine>,
    pub untaxed_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// Everything the delivery note template prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNoteReport {
    pub company: String,
    pub delivery: ReportDelivery,
    pub subtotal_0: Decimal,
    pub subtotal_12: Decimal,
    pub subtotal_14: Decimal,
    pub amount_in_words: String,
    /// Two-digit cents of the total, printed next to the amount in words.
    pub decimals: String,
    pub discount: Decimal,
}

impl DeliveryNoteReport {
    pub fn build(
        company: impl Into<String>,
        delivery: &Delivery,
        party: Option<&Party>,
        totals: DeliveryTotals,
        words: Option<&dyn NumberToWords>,
    ) -> Self {
        let lines = delivery
            .lines()
            .iter()
            .map(|line| ReportLine {
                line_no: line.line_no,
                description: line.description.clone(),
                quantity: line.quantity,
                unit: line.unit.as_ref().map(|u| u.symbol.clone()),
                unit_price: line.unit_price,
                amount: line_amount(delivery, line),
                note: line.note.clone(),
            })
            .collect();

        let [subtotal_0, subtotal_12, subtotal_14] =
            SUBTOTAL_RATES.map(|rate| subtotal_for_rate(delivery, rate));

        Self {
            company: company.into(),
            delivery: ReportDelivery {
                id: delivery.id_typed(),
                number: delivery.number().map(str::to_string),
                status: delivery.status(),
                party_name: party.map(|p| p.name.clone()),
                party_lang: party.and_then(|p| p.lang.clone()),
                delivery_date: delivery.delivery_date(),
                comment: delivery.comment().map(str::to_string),
                currency: delivery.currency().map(|c| c.code().to_string()),
                lines,
                untaxed_amount: totals.untaxed,
                tax_amount: totals.tax,
                total_amount: totals.total,
            },
            subtotal_0,
            subtotal_12,
            subtotal_14,
            amount_in_words: amount_in_words(totals.total, words),
            decimals: decimals(totals.total),
            discount: Decimal::ZERO,
        }
    }
}

fn line_amount(delivery: &Delivery, line: &deliverynote_delivery::DeliveryLine) -> Decimal {
    match delivery.currency() {
        Some(currency) => line.amount(currency),
        None => line.quantity * line.unit_price,
    }
}

/// Sum of the amounts of lines carrying a tax of `rate` percent, counted once
/// per matching tax. Always reported as a positive figure.
fn subtotal_for_rate(delivery: &Delivery, rate: i64) -> Decimal {
    let mut subtotal = Decimal::ZERO;
    for line in delivery.lines() {
        for tax in &line.taxes {
            let Some(tax_rate) = tax.rate() else {
                continue;
            };
            let percent = (tax_rate * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
            if percent == Decimal::from(rate) {
                subtotal += line_amount(delivery, line);
            }
        }
    }
    subtotal.abs()
}

/// Upper-cased words for the integer part of `total`.
///
/// Empty when no converter is configured or the total is zero.
fn amount_in_words(total: Decimal, words: Option<&dyn NumberToWords>) -> String {
    let Some(words) = words else {
        return String::new();
    };
    if total.is_zero() {
        return String::new();
    }
    match total.trunc().to_i64() {
        Some(units) => words.cardinal(units).to_uppercase(),
        None => String::new(),
    }
}

fn decimals(total: Decimal) -> String {
    let cents = (total.abs().fract() * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_u32()
        .unwrap_or(0)
        .min(99);
    format!("{cents:02}")
}

use std::str::FromStr;

use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use deliverynote_core::{AggregateRoot, Currency, DEFAULT_CURRENCY_DIGITS, DomainError};
use deliverynote_delivery::{Delivery, DeliveryTotals};
use deliverynote_infra::service::DeliveryHeader;
use deliverynote_parties::PartyId;
use deliverynote_products::ProductId;
use deliverynote_stock::{LocationId, Lot};
use deliverynote_taxes::TaxRounding;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct DeliveryRequest {
    pub party_id: PartyId,
    pub warehouse_id: LocationId,
    /// ISO code; the configured default currency when absent.
    pub currency: Option<String>,
    pub currency_digits: Option<u32>,
    pub delivery_date: Option<NaiveDate>,
    pub comment: Option<String>,
}

impl DeliveryRequest {
    pub fn into_header(self) -> Result<DeliveryHeader, DomainError> {
        let currency = self
            .currency
            .map(|code| {
                Currency::new(code, self.currency_digits.unwrap_or(DEFAULT_CURRENCY_DIGITS))
            })
            .transpose()?;
        Ok(DeliveryHeader {
            party_id: self.party_id,
            warehouse_id: self.warehouse_id,
            currency,
            delivery_date: self.delivery_date,
            comment: self.comment,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterLotRequest {
    pub product_id: ProductId,
    pub number: String,
}

// -------------------------
// Response mapping
// -------------------------

pub fn totals_to_json(totals: DeliveryTotals) -> JsonValue {
    json!({
        "untaxed_amount": totals.untaxed,
        "tax_amount": totals.tax,
        "total_amount": totals.total,
    })
}

pub fn delivery_to_json(delivery: &Delivery, rounding: TaxRounding) -> JsonValue {
    let currency = delivery.currency();
    let lines = delivery
        .lines()
        .iter()
        .map(|line| {
            json!({
                "line_no": line.line_no,
                "type": line.line_type,
                "product_id": line.product.as_ref().map(|p| p.id.to_string()),
                "quantity": line.quantity,
                "unit": line.unit.as_ref().map(|u| u.symbol.clone()),
                "unit_price": line.unit_price,
                "amount": currency.map(|c| line.amount(c)),
                "lot_id": line.lot_id.map(|l| l.to_string()),
                "description": line.description,
                "note": line.note,
                "taxes": line.taxes.iter().map(|t| t.id.to_string()).collect::<Vec<_>>(),
            })
        })
        .collect::<Vec<_>>();

    json!({
        "id": delivery.id_typed().to_string(),
        "number": delivery.number(),
        "status": delivery.status(),
        "party_id": delivery.party_id().map(|p| p.to_string()),
        "warehouse_id": delivery.warehouse_id().map(|w| w.to_string()),
        "currency": currency.map(|c| c.code()),
        "delivery_date": delivery.delivery_date(),
        "comment": delivery.comment(),
        "lines": lines,
        "moves": delivery.moves(),
        "totals": totals_to_json(delivery.totals(rounding)),
        "version": delivery.version(),
    })
}

pub fn lot_to_json(lot: &Lot) -> JsonValue {
    json!({
        "id": lot.id_typed().to_string(),
        "product_id": lot.product_id().map(|p| p.to_string()),
        "number": lot.number(),
        "used": lot.is_used(),
    })
}

pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|e: DomainError| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

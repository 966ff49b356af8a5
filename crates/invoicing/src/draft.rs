use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use deliverynote_core::{Currency, DomainError, DomainResult, TenantId};
use deliverynote_delivery::{Delivery, DeliveryId, DeliveryTotals, LineType};
use deliverynote_parties::PartyId;
use deliverynote_products::{ProductId, UomId};
use deliverynote_stock::{LocationId, LotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftState {
    Draft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub line_type: LineType,
    pub quantity: Decimal,
    pub unit: Option<UomId>,
    pub product_id: Option<ProductId>,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub description: String,
    pub lot_id: Option<LotId>,
}

/// The draft sale a consolidated delivery note is turned into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationDraft {
    pub company: TenantId,
    pub state: DraftState,
    pub sale_date: NaiveDate,
    pub party_id: PartyId,
    pub currency: Currency,
    pub warehouse_id: LocationId,
    pub delivery_id: DeliveryId,
    pub delivery_number: Option<String>,
    pub lines: Vec<DraftLine>,
    pub untaxed_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl ConsolidationDraft {
    pub fn from_delivery(
        delivery: &Delivery,
        totals: DeliveryTotals,
        today: NaiveDate,
    ) -> DomainResult<Self> {
        if !delivery.exists() {
            return Err(DomainError::not_found("delivery"));
        }
        let (Some(company), Some(party_id), Some(warehouse_id), Some(currency)) = (
            delivery.tenant_id(),
            delivery.party_id(),
            delivery.warehouse_id(),
            delivery.currency(),
        ) else {
            return Err(DomainError::invariant("delivery header is incomplete"));
        };

        let lines = delivery
            .lines()
            .iter()
            .map(|line| DraftLine {
                line_type: line.line_type,
                quantity: line.quantity,
                unit: line.unit.as_ref().map(|u| u.id),
                product_id: line.product.as_ref().map(|p| p.id),
                unit_price: line.unit_price,
                amount: line.amount(currency),
                description: line.description.clone(),
                lot_id: line.lot_id,
            })
            .collect();

        Ok(Self {
            company,
            state: DraftState::Draft,
            sale_date: today,
            party_id,
            currency: currency.clone(),
            warehouse_id,
            delivery_id: delivery.id_typed(),
            delivery_number: delivery.number().map(str::to_string),
            lines,
            untaxed_amount: totals.untaxed,
            tax_amount: totals.tax,
            total_amount: totals.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deliverynote_delivery::{AddLine, CreateDelivery, DeliveryCommand, LineInput};
    use deliverynote_events::execute;
    use deliverynote_taxes::{Tax, TaxId, TaxRounding};
    use rust_decimal_macros::dec;

    #[test]
    fn draft_copies_header_lines_and_totals() {
        let tenant_id = TenantId::new();
        let delivery_id = DeliveryId::generate();
        let party_id = PartyId::generate();
        let warehouse_id = LocationId::generate();
        let mut delivery = Delivery::empty(delivery_id);

        execute(
            &mut delivery,
            &DeliveryCommand::CreateDelivery(CreateDelivery {
                tenant_id,
                delivery_id,
                party_id,
                warehouse_id,
                currency: Currency::new("usd", 2).unwrap(),
                delivery_date: None,
                comment: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        execute(
            &mut delivery,
            &DeliveryCommand::AddLine(AddLine {
                tenant_id,
                delivery_id,
                line: LineInput {
                    line_type: LineType::Line,
                    product: None,
                    quantity: dec!(3),
                    unit: None,
                    unit_price: dec!(1.5),
                    lot_id: None,
                    description: "Delivery fee".to_string(),
                    note: None,
                    taxes: vec![Tax::percentage(TaxId::generate(), "VAT 12%", dec!(0.12))],
                },
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let totals = delivery.totals(TaxRounding::Document);
        let draft = ConsolidationDraft::from_delivery(&delivery, totals, today).unwrap();

        assert_eq!(draft.company, tenant_id);
        assert_eq!(draft.state, DraftState::Draft);
        assert_eq!(draft.sale_date, today);
        assert_eq!(draft.party_id, party_id);
        assert_eq!(draft.currency.code(), "USD");
        assert_eq!(draft.warehouse_id, warehouse_id);
        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.lines[0].amount, dec!(4.50));
        assert_eq!(draft.untaxed_amount, dec!(4.50));
        assert_eq!(draft.tax_amount, dec!(0.54));
        assert_eq!(draft.total_amount, dec!(5.04));
    }

    #[test]
    fn unknown_delivery_has_no_draft() {
        let delivery = Delivery::empty(DeliveryId::generate());
        let today = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let err = ConsolidationDraft::from_delivery(&delivery, DeliveryTotals::default(), today)
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("delivery"));
    }
}

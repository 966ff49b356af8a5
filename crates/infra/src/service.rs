//! Application service for delivery notes.
//!
//! Resolves catalog data into commands, drives the delivery and lot
//! aggregates through the [`CommandDispatcher`], and builds the derived
//! documents (consolidation draft, printed report).

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use deliverynote_core::{AggregateRoot, Currency, DomainError, ExpectedVersion, TenantId};
use deliverynote_delivery::{
    AddLine, AnnulDelivery, ConsolidateDelivery, CreateDelivery, Delivery, DeliveryCommand,
    DeliveryEvent, DeliveryId, DeliveryTotals, LineInput, LineProduct, LineType, MoveRouting,
    RemoveLine, SaveDelivery, UpdateDelivery, UpdateLine, format_number,
};
use deliverynote_events::{EventBus, EventEnvelope};
use deliverynote_invoicing::ConsolidationDraft;
use deliverynote_parties::{Party, PartyId};
use deliverynote_products::{ProductId, UomId};
use deliverynote_report::{DeliveryNoteReport, NumberToWords, SpanishWords};
use deliverynote_stock::{
    LocationId, Lot, LotCommand, LotId, MarkLotAvailable, MarkLotUsed, RegisterLot,
};
use deliverynote_taxes::TaxId;

use crate::catalog::Catalog;
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::config::{AmountWords, DeliveryConfig};
use crate::event_store::{EventStore, StoredEvent};
use crate::sequence::{NumberSequence, SequenceError};

/// Stream type of delivery notes in the event store.
pub const DELIVERY_AGGREGATE: &str = "delivery.note";
/// Stream type of lots in the event store.
pub const LOT_AGGREGATE: &str = "stock.lot";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Dispatch(DispatchError),
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Validation(msg) => ServiceError::Validation(msg),
            DispatchError::InvariantViolation(msg) => ServiceError::InvariantViolation(msg),
            DispatchError::Concurrency(msg) => ServiceError::Concurrency(msg),
            DispatchError::NotFound(what) => ServiceError::NotFound(what),
            other => ServiceError::Dispatch(other),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        ServiceError::from(DispatchError::from(value))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Header fields of a delivery note.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeliveryHeader {
    pub party_id: PartyId,
    pub warehouse_id: LocationId,
    /// Falls back to the configured default currency.
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A line as entered by a user. Empty fields are filled from the product.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LineRequest {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_id: Option<UomId>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub lot_id: Option<LotId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub tax_ids: Option<Vec<TaxId>>,
}

/// Result of consolidating a delivery: the delivery itself and the draft
/// sale prefilled from it.
#[derive(Debug, Clone)]
pub struct Consolidation {
    pub delivery: Delivery,
    pub draft: ConsolidationDraft,
}

pub struct DeliveryService<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    catalog: Arc<dyn Catalog>,
    sequence: Arc<dyn NumberSequence>,
    words: Option<Arc<dyn NumberToWords>>,
    config: DeliveryConfig,
}

impl<S, B> DeliveryService<S, B> {
    pub fn new(
        dispatcher: CommandDispatcher<S, B>,
        catalog: Arc<dyn Catalog>,
        sequence: Arc<dyn NumberSequence>,
        config: DeliveryConfig,
    ) -> Self {
        let words: Option<Arc<dyn NumberToWords>> = match config.amount_words {
            AmountWords::Spanish => Some(Arc::new(SpanishWords)),
            AmountWords::Off => None,
        };
        Self {
            dispatcher,
            catalog,
            sequence,
            words,
            config,
        }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }
}

impl<S, B> DeliveryService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn create(&self, tenant_id: TenantId, header: DeliveryHeader) -> ServiceResult<Delivery> {
        self.check_header(tenant_id, &header)?;
        let delivery_id = DeliveryId::generate();
        let currency = header
            .currency
            .unwrap_or_else(|| self.config.default_currency.clone());

        self.dispatch_delivery(
            tenant_id,
            delivery_id,
            DeliveryCommand::CreateDelivery(CreateDelivery {
                tenant_id,
                delivery_id,
                party_id: header.party_id,
                warehouse_id: header.warehouse_id,
                currency,
                delivery_date: header.delivery_date,
                comment: header.comment,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%tenant_id, %delivery_id, "delivery created");
        self.get(tenant_id, delivery_id)
    }

    pub fn update(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
        header: DeliveryHeader,
    ) -> ServiceResult<Delivery> {
        self.check_header(tenant_id, &header)?;
        let current = self.get(tenant_id, delivery_id)?;
        let currency = match header.currency {
            Some(currency) => currency,
            None => current
                .currency()
                .cloned()
                .unwrap_or_else(|| self.config.default_currency.clone()),
        };

        self.dispatch_delivery(
            tenant_id,
            delivery_id,
            DeliveryCommand::UpdateDelivery(UpdateDelivery {
                tenant_id,
                delivery_id,
                party_id: header.party_id,
                warehouse_id: header.warehouse_id,
                currency,
                delivery_date: header.delivery_date,
                comment: header.comment,
                occurred_at: Utc::now(),
            }),
        )?;
        self.get(tenant_id, delivery_id)
    }

    pub fn add_line(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
        request: LineRequest,
    ) -> ServiceResult<Delivery> {
        let delivery = self.get(tenant_id, delivery_id)?;
        let line = self.resolve_line(tenant_id, &delivery, request)?;
        self.dispatch_delivery(
            tenant_id,
            delivery_id,
            DeliveryCommand::AddLine(AddLine {
                tenant_id,
                delivery_id,
                line,
                occurred_at: Utc::now(),
            }),
        )?;
        self.get(tenant_id, delivery_id)
    }

    pub fn update_line(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
        line_no: u32,
        request: LineRequest,
    ) -> ServiceResult<Delivery> {
        let delivery = self.get(tenant_id, delivery_id)?;
        if delivery.line(line_no).is_none() {
            return Err(ServiceError::NotFound("line"));
        }
        let line = self.resolve_line(tenant_id, &delivery, request)?;
        self.dispatch_delivery(
            tenant_id,
            delivery_id,
            DeliveryCommand::UpdateLine(UpdateLine {
                tenant_id,
                delivery_id,
                line_no,
                line,
                occurred_at: Utc::now(),
            }),
        )?;
        self.get(tenant_id, delivery_id)
    }

    pub fn remove_line(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
        line_no: u32,
    ) -> ServiceResult<Delivery> {
        let delivery = self.get(tenant_id, delivery_id)?;
        if delivery.line(line_no).is_none() {
            return Err(ServiceError::NotFound("line"));
        }
        self.dispatch_delivery(
            tenant_id,
            delivery_id,
            DeliveryCommand::RemoveLine(RemoveLine {
                tenant_id,
                delivery_id,
                line_no,
                occurred_at: Utc::now(),
            }),
        )?;
        self.get(tenant_id, delivery_id)
    }

    /// Ship the goods: reserve lots, assign the next number, record the
    /// outbound moves.
    ///
    /// The number is only drawn once the delivery is known to be saveable,
    /// and reserved lots are released again if the save does not commit.
    pub fn save(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
        today: NaiveDate,
    ) -> ServiceResult<Delivery> {
        let delivery = self.get(tenant_id, delivery_id)?;
        let routing = self.routing(tenant_id, &delivery)?;

        let command = |number: String| {
            DeliveryCommand::SaveDelivery(SaveDelivery {
                tenant_id,
                delivery_id,
                number,
                routing: routing.clone(),
                today,
                occurred_at: Utc::now(),
            })
        };

        // Dry run with a placeholder number so a rejected save draws nothing.
        deliverynote_core::Aggregate::handle(&delivery, &command(format_number(0)))?;

        let lots = self.check_lots(tenant_id, &delivery)?;
        let reserved = self.reserve_lots(tenant_id, &lots)?;

        let outcome = self
            .sequence
            .next(tenant_id, routing.warehouse.id)
            .map_err(ServiceError::from)
            .and_then(|value| {
                let number = format_number(value);
                // Lots were checked against this snapshot; a later edit must not ship.
                self.dispatcher.dispatch_at::<Delivery>(
                    tenant_id,
                    delivery_id.0,
                    DELIVERY_AGGREGATE,
                    ExpectedVersion::Exact(delivery.version()),
                    command(number.clone()),
                    |_, id| Delivery::empty(DeliveryId::new(id)),
                )?;
                Ok(number)
            });

        match outcome {
            Ok(number) => {
                tracing::info!(%tenant_id, %delivery_id, %number, lots = reserved.len(), "delivery saved");
                self.get(tenant_id, delivery_id)
            }
            Err(err) => {
                tracing::warn!(%tenant_id, %delivery_id, error = %err, "save failed; releasing lots");
                self.release_lots(tenant_id, &reserved);
                Err(err)
            }
        }
    }

    /// Return the goods for invoicing and open the draft sale.
    pub fn consolidate(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
        today: NaiveDate,
    ) -> ServiceResult<Consolidation> {
        let delivery = self.get(tenant_id, delivery_id)?;
        let routing = self.routing(tenant_id, &delivery)?;

        let committed = self.dispatch_delivery(
            tenant_id,
            delivery_id,
            DeliveryCommand::ConsolidateDelivery(ConsolidateDelivery {
                tenant_id,
                delivery_id,
                routing,
                today,
                tax_rounding: self.config.tax_rounding,
                occurred_at: Utc::now(),
            }),
        )?;
        self.release_lots(tenant_id, &moved_lots(&committed));

        let delivery = self.get(tenant_id, delivery_id)?;
        let draft = ConsolidationDraft::from_delivery(
            &delivery,
            delivery.totals(self.config.tax_rounding),
            today,
        )?;
        tracing::info!(%tenant_id, %delivery_id, "delivery consolidated");
        Ok(Consolidation { delivery, draft })
    }

    pub fn annul(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
        today: NaiveDate,
    ) -> ServiceResult<Delivery> {
        let delivery = self.get(tenant_id, delivery_id)?;
        let routing = self.routing(tenant_id, &delivery)?;

        let committed = self.dispatch_delivery(
            tenant_id,
            delivery_id,
            DeliveryCommand::AnnulDelivery(AnnulDelivery {
                tenant_id,
                delivery_id,
                routing,
                today,
                tax_rounding: self.config.tax_rounding,
                occurred_at: Utc::now(),
            }),
        )?;
        self.release_lots(tenant_id, &moved_lots(&committed));
        tracing::info!(%tenant_id, %delivery_id, "delivery annulled");
        self.get(tenant_id, delivery_id)
    }

    pub fn get(&self, tenant_id: TenantId, delivery_id: DeliveryId) -> ServiceResult<Delivery> {
        let delivery: Delivery = self
            .dispatcher
            .load(tenant_id, delivery_id.0, |_, id| Delivery::empty(DeliveryId::new(id)))?;
        if !delivery.exists() {
            return Err(ServiceError::NotFound("delivery"));
        }
        Ok(delivery)
    }

    pub fn totals(&self, tenant_id: TenantId, delivery_id: DeliveryId) -> ServiceResult<DeliveryTotals> {
        Ok(self
            .get(tenant_id, delivery_id)?
            .totals(self.config.tax_rounding))
    }

    pub fn report(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
    ) -> ServiceResult<DeliveryNoteReport> {
        let delivery = self.get(tenant_id, delivery_id)?;
        let party = delivery
            .party_id()
            .and_then(|id| self.catalog.party(tenant_id, id));
        Ok(DeliveryNoteReport::build(
            self.config.company_name.clone(),
            &delivery,
            party.as_ref(),
            delivery.totals(self.config.tax_rounding),
            self.words.as_deref(),
        ))
    }

    pub fn register_lot(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        number: impl Into<String>,
    ) -> ServiceResult<Lot> {
        let product = self
            .catalog
            .product(tenant_id, product_id)
            .ok_or(ServiceError::NotFound("product"))?;
        if product.is_service() {
            return Err(ServiceError::Validation(
                "lots can only be registered for goods".to_string(),
            ));
        }

        let lot_id = LotId::generate();
        self.dispatch_lot(
            tenant_id,
            lot_id,
            LotCommand::RegisterLot(RegisterLot {
                tenant_id,
                lot_id,
                product_id,
                number: number.into(),
                occurred_at: Utc::now(),
            }),
        )?;
        self.lot(tenant_id, lot_id)
    }

    pub fn lot(&self, tenant_id: TenantId, lot_id: LotId) -> ServiceResult<Lot> {
        let lot: Lot = self
            .dispatcher
            .load(tenant_id, lot_id.0, |_, id| Lot::empty(LotId::new(id)))?;
        if !lot.exists() {
            return Err(ServiceError::NotFound("lot"));
        }
        Ok(lot)
    }

    fn dispatch_delivery(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
        command: DeliveryCommand,
    ) -> ServiceResult<Vec<StoredEvent>> {
        Ok(self.dispatcher.dispatch::<Delivery>(
            tenant_id,
            delivery_id.0,
            DELIVERY_AGGREGATE,
            command,
            |_, id| Delivery::empty(DeliveryId::new(id)),
        )?)
    }

    fn dispatch_lot(
        &self,
        tenant_id: TenantId,
        lot_id: LotId,
        command: LotCommand,
    ) -> ServiceResult<Vec<StoredEvent>> {
        Ok(self.dispatcher.dispatch::<Lot>(
            tenant_id,
            lot_id.0,
            LOT_AGGREGATE,
            command,
            |_, id| Lot::empty(LotId::new(id)),
        )?)
    }

    fn check_header(&self, tenant_id: TenantId, header: &DeliveryHeader) -> ServiceResult<()> {
        if self.catalog.party(tenant_id, header.party_id).is_none() {
            return Err(ServiceError::NotFound("party"));
        }
        if self.catalog.warehouse(tenant_id, header.warehouse_id).is_none() {
            return Err(ServiceError::NotFound("warehouse"));
        }
        Ok(())
    }

    fn routing(&self, tenant_id: TenantId, delivery: &Delivery) -> ServiceResult<MoveRouting> {
        let warehouse = delivery
            .warehouse_id()
            .and_then(|id| self.catalog.warehouse(tenant_id, id))
            .ok_or(ServiceError::NotFound("warehouse"))?;
        let customer_location = delivery
            .party_id()
            .and_then(|id| self.catalog.party(tenant_id, id))
            .and_then(|party| party.customer_location);
        Ok(MoveRouting {
            warehouse,
            customer_location,
        })
    }

    /// Fill a line from catalog data, the way picking a product in the form
    /// does: sale unit, list price, customer taxes and display name.
    fn resolve_line(
        &self,
        tenant_id: TenantId,
        delivery: &Delivery,
        request: LineRequest,
    ) -> ServiceResult<LineInput> {
        let product = request
            .product_id
            .map(|id| {
                self.catalog
                    .product(tenant_id, id)
                    .ok_or(ServiceError::NotFound("product"))
            })
            .transpose()?;
        if let Some(product) = product.as_ref().filter(|p| !p.salable) {
            return Err(ServiceError::Validation(format!(
                "product '{}' is not salable",
                product.name
            )));
        }

        let requested_unit = request
            .unit_id
            .map(|id| {
                self.catalog
                    .uom(tenant_id, id)
                    .ok_or(ServiceError::NotFound("unit"))
            })
            .transpose()?;
        // Without a compatible unit the line falls back to the product's sale unit.
        let unit = match (requested_unit, &product) {
            (Some(unit), Some(product)) if unit.category != product.sale_uom.category => {
                Some(product.sale_uom.clone())
            }
            (Some(unit), _) => Some(unit),
            (None, product) => product.as_ref().map(|p| p.sale_uom.clone()),
        };

        let tax_ids = match (request.tax_ids, &product) {
            (Some(ids), _) => ids,
            (None, Some(product)) => {
                let party = delivery
                    .party_id()
                    .and_then(|id| self.catalog.party(tenant_id, id));
                customer_taxes(party.as_ref(), &product.customer_taxes)
            }
            (None, None) => Vec::new(),
        };
        let taxes = self.catalog.taxes(tenant_id, &tax_ids)?;

        if let Some(lot_id) = request.lot_id {
            let lot = self.lot(tenant_id, lot_id)?;
            let available = product
                .as_ref()
                .is_some_and(|p| lot.is_available_for(p.id));
            if !available {
                return Err(ServiceError::Validation(format!(
                    "lot {} is not available for this product",
                    lot.number()
                )));
            }
        }

        let unit_price = request
            .unit_price
            .or_else(|| product.as_ref().map(|p| p.sale_price()))
            .unwrap_or(Decimal::ZERO);
        let description = request
            .description
            .filter(|d| !d.trim().is_empty())
            .or_else(|| product.as_ref().map(|p| p.rec_name()))
            .unwrap_or_default();

        Ok(LineInput {
            line_type: LineType::Line,
            product: product.as_ref().map(LineProduct::from_product),
            quantity: request.quantity,
            unit,
            unit_price,
            lot_id: request.lot_id,
            description,
            note: request.note,
            taxes,
        })
    }

    /// Lots the save will ship, each checked against its line's product.
    fn check_lots(&self, tenant_id: TenantId, delivery: &Delivery) -> ServiceResult<Vec<LotId>> {
        let mut lots = Vec::new();
        for line in delivery.lines().iter().filter(|l| l.moves_goods()) {
            let (Some(product), Some(lot_id)) = (&line.product, line.lot_id) else {
                continue;
            };
            let lot = self.lot(tenant_id, lot_id)?;
            if !lot.is_available_for(product.id) {
                return Err(ServiceError::Validation(format!(
                    "lot {} on line {} is not available",
                    lot.number(),
                    line.line_no
                )));
            }
            lots.push(lot_id);
        }
        Ok(lots)
    }

    /// Mark every lot used; on the first failure undo the ones already taken.
    fn reserve_lots(&self, tenant_id: TenantId, lots: &[LotId]) -> ServiceResult<Vec<LotId>> {
        let mut reserved = Vec::with_capacity(lots.len());
        for &lot_id in lots {
            let result = self.dispatch_lot(
                tenant_id,
                lot_id,
                LotCommand::MarkLotUsed(MarkLotUsed {
                    tenant_id,
                    lot_id,
                    occurred_at: Utc::now(),
                }),
            );
            if let Err(err) = result {
                self.release_lots(tenant_id, &reserved);
                return Err(err);
            }
            reserved.push(lot_id);
        }
        Ok(reserved)
    }

    fn release_lots(&self, tenant_id: TenantId, lots: &[LotId]) {
        for &lot_id in lots {
            let result = self.dispatch_lot(
                tenant_id,
                lot_id,
                LotCommand::MarkLotAvailable(MarkLotAvailable {
                    tenant_id,
                    lot_id,
                    occurred_at: Utc::now(),
                }),
            );
            if let Err(error) = result {
                tracing::error!(%tenant_id, %lot_id, %error, "failed to release lot");
            }
        }
    }
}

fn customer_taxes(party: Option<&Party>, product_taxes: &[TaxId]) -> Vec<TaxId> {
    match party {
        Some(party) => party.customer_taxes(product_taxes),
        None => product_taxes.to_vec(),
    }
}

/// Lots carried by the moves of freshly committed delivery events.
fn moved_lots(committed: &[StoredEvent]) -> Vec<LotId> {
    committed
        .iter()
        .filter_map(|stored| serde_json::from_value::<DeliveryEvent>(stored.payload.clone()).ok())
        .flat_map(|ev| ev.moves().iter().map(|m| m.lot_id).collect::<Vec<_>>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_errors_keep_their_kind() {
        assert!(matches!(
            ServiceError::from(DomainError::validation("x")),
            ServiceError::Validation(_)
        ));
        assert!(matches!(
            ServiceError::from(DomainError::not_found("delivery")),
            ServiceError::NotFound("delivery")
        ));
        assert!(matches!(
            ServiceError::from(DispatchError::Deserialize("bad".to_string())),
            ServiceError::Dispatch(_)
        ));
    }
}

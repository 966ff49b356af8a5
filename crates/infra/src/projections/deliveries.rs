use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use deliverynote_core::{AggregateId, TenantId};
use deliverynote_delivery::{DeliveryEvent, DeliveryId, DeliveryStatus, DeliveryTotals};
use deliverynote_events::EventEnvelope;
use deliverynote_parties::PartyId;
use deliverynote_stock::LocationId;

use crate::projections::cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
use crate::projections::{Projection, ProjectionError, should_apply};
use crate::read_model::TenantStore;
use crate::service::DELIVERY_AGGREGATE;

/// List/detail row for a delivery note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReadModel {
    pub delivery_id: DeliveryId,
    pub number: Option<String>,
    pub status: DeliveryStatus,
    pub party_id: PartyId,
    pub warehouse_id: LocationId,
    pub currency: String,
    pub delivery_date: Option<NaiveDate>,
    pub line_count: usize,
    /// Present once the delivery is invoiced or annulled.
    pub totals: Option<DeliveryTotals>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DeliveriesProjection<S, C = InMemoryCursorStore>
where
    S: TenantStore<DeliveryId, DeliveryReadModel>,
{
    store: S,
    cursors: C,
    projection_name: String,
}

impl<S> DeliveriesProjection<S>
where
    S: TenantStore<DeliveryId, DeliveryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self::with_cursor_store(store, InMemoryCursorStore::new())
    }
}

impl<S, C> DeliveriesProjection<S, C>
where
    S: TenantStore<DeliveryId, DeliveryReadModel>,
    C: ProjectionCursorStore,
{
    pub fn with_cursor_store(store: S, cursors: C) -> Self {
        Self {
            store,
            cursors,
            projection_name: "delivery.notes".to_string(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, delivery_id: &DeliveryId) -> Option<DeliveryReadModel> {
        self.store.get(tenant_id, delivery_id)
    }

    /// All deliveries of a tenant, most recently numbered first; drafts last.
    pub fn list(&self, tenant_id: TenantId) -> Vec<DeliveryReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| {
            number_key(b)
                .cmp(&number_key(a))
                .then_with(|| a.delivery_id.cmp(&b.delivery_id))
        });
        rows
    }

    fn cursor(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.cursors
            .get_cursor(tenant_id, aggregate_id, &self.projection_name)
            .unwrap_or(0)
    }

    fn update(&self, tenant_id: TenantId, delivery_id: DeliveryId, f: impl FnOnce(&mut DeliveryReadModel)) {
        match self.store.get(tenant_id, &delivery_id) {
            Some(mut rm) => {
                f(&mut rm);
                self.store.upsert(tenant_id, delivery_id, rm);
            }
            None => tracing::warn!(%tenant_id, %delivery_id, "event for unknown delivery skipped"),
        }
    }
}

fn event_stream(ev: &DeliveryEvent) -> (TenantId, DeliveryId) {
    match ev {
        DeliveryEvent::DeliveryCreated(e) => (e.tenant_id, e.delivery_id),
        DeliveryEvent::DeliveryUpdated(e) => (e.tenant_id, e.delivery_id),
        DeliveryEvent::LineAdded(e) => (e.tenant_id, e.delivery_id),
        DeliveryEvent::LineUpdated(e) => (e.tenant_id, e.delivery_id),
        DeliveryEvent::LineRemoved(e) => (e.tenant_id, e.delivery_id),
        DeliveryEvent::DeliverySaved(e) => (e.tenant_id, e.delivery_id),
        DeliveryEvent::DeliveryConsolidated(e) => (e.tenant_id, e.delivery_id),
        DeliveryEvent::DeliveryAnnulled(e) => (e.tenant_id, e.delivery_id),
    }
}

/// Decode a delivery envelope and check it belongs to the stream it claims.
pub(crate) fn decode_delivery_event(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<DeliveryEvent, ProjectionError> {
    let ev: DeliveryEvent = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

    let (event_tenant, delivery_id) = event_stream(&ev);
    if event_tenant != envelope.tenant_id() {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    if delivery_id.0 != envelope.aggregate_id() {
        return Err(ProjectionError::TenantIsolation(
            "event delivery_id does not match envelope aggregate_id".to_string(),
        ));
    }
    Ok(ev)
}

impl<S, C> Projection for DeliveriesProjection<S, C>
where
    S: TenantStore<DeliveryId, DeliveryReadModel>,
    C: ProjectionCursorStore,
{
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if !envelope.is_from(DELIVERY_AGGREGATE) {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !should_apply(self.cursor(tenant_id, aggregate_id), seq)? {
            return Ok(());
        }

        let ev = decode_delivery_event(envelope)?;
        let at = deliverynote_events::Event::occurred_at(&ev);

        match ev {
            DeliveryEvent::DeliveryCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.delivery_id,
                    DeliveryReadModel {
                        delivery_id: e.delivery_id,
                        number: None,
                        status: DeliveryStatus::Draft,
                        party_id: e.party_id,
                        warehouse_id: e.warehouse_id,
                        currency: e.currency.code().to_string(),
                        delivery_date: e.delivery_date,
                        line_count: 0,
                        totals: None,
                        updated_at: at,
                    },
                );
            }
            DeliveryEvent::DeliveryUpdated(e) => self.update(tenant_id, e.delivery_id, |rm| {
                rm.party_id = e.party_id;
                rm.warehouse_id = e.warehouse_id;
                rm.currency = e.currency.code().to_string();
                rm.delivery_date = e.delivery_date;
                rm.updated_at = at;
            }),
            DeliveryEvent::LineAdded(e) => self.update(tenant_id, e.delivery_id, |rm| {
                rm.line_count += 1;
                rm.updated_at = at;
            }),
            DeliveryEvent::LineUpdated(e) => self.update(tenant_id, e.delivery_id, |rm| {
                rm.updated_at = at;
            }),
            DeliveryEvent::LineRemoved(e) => self.update(tenant_id, e.delivery_id, |rm| {
                rm.line_count = rm.line_count.saturating_sub(1);
                rm.updated_at = at;
            }),
            DeliveryEvent::DeliverySaved(e) => self.update(tenant_id, e.delivery_id, |rm| {
                rm.number = Some(e.number.clone());
                rm.status = DeliveryStatus::Saved;
                rm.updated_at = at;
            }),
            DeliveryEvent::DeliveryConsolidated(e) => self.update(tenant_id, e.delivery_id, |rm| {
                rm.status = DeliveryStatus::Invoiced;
                rm.totals = Some(e.totals);
                rm.updated_at = at;
            }),
            DeliveryEvent::DeliveryAnnulled(e) => self.update(tenant_id, e.delivery_id, |rm| {
                rm.status = DeliveryStatus::Anulled;
                rm.totals = Some(e.totals);
                rm.updated_at = at;
            }),
        }

        self.cursors
            .update_cursor(tenant_id, aggregate_id, &self.projection_name, seq);
        Ok(())
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_cursors(tenant_id, &self.projection_name);
    }
}

/// Numbers are zero-padded digits that grow past nine places, so a longer
/// number is always the later one.
fn number_key(row: &DeliveryReadModel) -> (bool, usize, &str) {
    match row.number.as_deref() {
        Some(number) => (true, number.len(), number),
        None => (false, 0, ""),
    }
}

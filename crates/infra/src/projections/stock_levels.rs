use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;

use deliverynote_core::{AggregateId, TenantId};
use deliverynote_events::EventEnvelope;
use deliverynote_products::ProductId;
use deliverynote_stock::LocationId;

use crate::projections::cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
use crate::projections::deliveries::decode_delivery_event;
use crate::projections::{Projection, ProjectionError, should_apply};
use crate::read_model::TenantStore;
use crate::service::DELIVERY_AGGREGATE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StockKey {
    pub location_id: LocationId,
    pub product_id: ProductId,
}

/// Quantity of a product at a location, as moved by done delivery moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub location_id: LocationId,
    pub product_id: ProductId,
    pub quantity: Decimal,
}

#[derive(Debug)]
pub struct StockLevelsProjection<S, C = InMemoryCursorStore>
where
    S: TenantStore<StockKey, StockLevel>,
{
    store: S,
    cursors: C,
    projection_name: String,
}

impl<S> StockLevelsProjection<S>
where
    S: TenantStore<StockKey, StockLevel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: InMemoryCursorStore::new(),
            projection_name: "stock.levels".to_string(),
        }
    }
}

impl<S, C> StockLevelsProjection<S, C>
where
    S: TenantStore<StockKey, StockLevel>,
    C: ProjectionCursorStore,
{
    pub fn get(&self, tenant_id: TenantId, key: &StockKey) -> Option<StockLevel> {
        self.store.get(tenant_id, key)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<StockLevel> {
        let mut levels = self.store.list(tenant_id);
        levels.sort_by(|a, b| {
            a.location_id
                .cmp(&b.location_id)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        levels
    }

    fn add(&self, tenant_id: TenantId, location_id: LocationId, product_id: ProductId, delta: Decimal) {
        if delta.is_zero() {
            return;
        }
        let key = StockKey {
            location_id,
            product_id,
        };
        let mut level = self.store.get(tenant_id, &key).unwrap_or(StockLevel {
            location_id,
            product_id,
            quantity: Decimal::ZERO,
        });
        level.quantity += delta;
        self.store.upsert(tenant_id, key, level);
    }

    fn cursor(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.cursors
            .get_cursor(tenant_id, aggregate_id, &self.projection_name)
            .unwrap_or(0)
    }
}

impl<S, C> Projection for StockLevelsProjection<S, C>
where
    S: TenantStore<StockKey, StockLevel>,
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
        for mv in ev.moves().iter().filter(|m| m.is_done()) {
            self.add(tenant_id, mv.from_location, mv.product_id, mv.delta_at(mv.from_location));
            self.add(tenant_id, mv.to_location, mv.product_id, mv.delta_at(mv.to_location));
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

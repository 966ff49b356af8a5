use std::sync::Arc;

use serde_json::Value as JsonValue;

use deliverynote_core::TenantId;
use deliverynote_delivery::DeliveryId;
use deliverynote_events::{EventBus, EventEnvelope, InMemoryEventBus};
use deliverynote_infra::{
    catalog::InMemoryCatalog,
    command_dispatcher::CommandDispatcher,
    config::DeliveryConfig,
    event_store::InMemoryEventStore,
    projections::{
        DeliveriesProjection, DeliveryReadModel, Projection, StockKey, StockLevel,
        StockLevelsProjection,
    },
    read_model::InMemoryTenantStore,
    sequence::InMemoryNumberSequence,
    service::DeliveryService,
};

pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Service = DeliveryService<Arc<InMemoryEventStore>, Bus>;
pub type DeliveriesView =
    DeliveriesProjection<Arc<InMemoryTenantStore<DeliveryId, DeliveryReadModel>>>;
pub type StockView = StockLevelsProjection<Arc<InMemoryTenantStore<StockKey, StockLevel>>>;

/// Everything the handlers reach through `Extension<Arc<AppServices>>`.
pub struct AppServices {
    pub delivery: Service,
    pub deliveries_projection: Arc<DeliveriesView>,
    pub stock_projection: Arc<StockView>,
}

impl AppServices {
    pub fn deliveries_list(&self, tenant_id: TenantId) -> Vec<DeliveryReadModel> {
        self.deliveries_projection.list(tenant_id)
    }

    pub fn stock_levels(&self, tenant_id: TenantId) -> Vec<StockLevel> {
        self.stock_projection.list(tenant_id)
    }
}

/// In-memory wiring: store + bus + catalog + sequence, with a background
/// subscriber feeding the projections.
pub fn build_services(config: DeliveryConfig) -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let deliveries_projection = Arc::new(DeliveriesProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let stock_projection = Arc::new(StockLevelsProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));

    // Background subscriber: bus -> projections
    {
        let sub = bus.subscribe();
        let deliveries_projection = deliveries_projection.clone();
        let stock_projection = stock_projection.clone();
        tokio::task::spawn_blocking(move || {
            while let Ok(env) = sub.recv() {
                if let Err(e) = deliveries_projection.apply_envelope(&env) {
                    tracing::warn!(aggregate_id = %env.aggregate_id(), event_type = env.event_type(), "delivery projection apply failed: {e}");
                }
                if let Err(e) = stock_projection.apply_envelope(&env) {
                    tracing::warn!(aggregate_id = %env.aggregate_id(), event_type = env.event_type(), "stock projection apply failed: {e}");
                }
            }
            tracing::info!("event bus closed; projection subscriber stopped");
        });
    }

    let sequence = Arc::new(InMemoryNumberSequence::new(config.sequence_start));
    let delivery = DeliveryService::new(
        CommandDispatcher::new(store, bus),
        Arc::new(InMemoryCatalog::new()),
        sequence,
        config,
    );

    AppServices {
        delivery,
        deliveries_projection,
        stock_projection,
    }
}

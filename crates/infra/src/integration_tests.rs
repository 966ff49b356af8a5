//! End-to-end delivery flows through the service, the event store, the bus
//! and both projections.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use serde_json::Value as JsonValue;

use deliverynote_core::TenantId;
use deliverynote_delivery::{DeliveryId, DeliveryStatus};
use deliverynote_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use deliverynote_parties::{Party, PartyId};
use deliverynote_products::{Product, ProductId, ProductKind, Uom, UomCategoryId, UomId};
use deliverynote_stock::{LocationId, LotId, Warehouse};
use deliverynote_taxes::{Tax, TaxId};

use crate::catalog::{Catalog, InMemoryCatalog};
use crate::command_dispatcher::CommandDispatcher;
use crate::config::DeliveryConfig;
use crate::event_store::InMemoryEventStore;
use crate::projections::{
    DeliveriesProjection, DeliveryReadModel, Projection, StockKey, StockLevel,
    StockLevelsProjection,
};
use crate::read_model::InMemoryTenantStore;
use crate::sequence::{InMemoryNumberSequence, NumberSequence, SequenceError};
use crate::service::{DeliveryHeader, DeliveryService, LineRequest, ServiceError};

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Service = DeliveryService<Arc<InMemoryEventStore>, Bus>;

/// Counter that can run one piece of work right before handing out a value,
/// which is where a concurrent request lands during a save.
#[derive(Default)]
struct SteppedSequence {
    inner: InMemoryNumberSequence,
    before_next: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl SteppedSequence {
    fn before_next(&self, step: impl FnOnce() + Send + 'static) {
        *self.before_next.lock().unwrap() = Some(Box::new(step));
    }
}

impl NumberSequence for SteppedSequence {
    fn next(&self, tenant_id: TenantId, warehouse_id: LocationId) -> Result<u64, SequenceError> {
        let step = self.before_next.lock().unwrap().take();
        if let Some(step) = step {
            step();
        }
        self.inner.next(tenant_id, warehouse_id)
    }

    fn peek(&self, tenant_id: TenantId, warehouse_id: LocationId) -> Result<u64, SequenceError> {
        self.inner.peek(tenant_id, warehouse_id)
    }
}

struct World {
    service: Service,
    store: Arc<InMemoryEventStore>,
    bus: Bus,
    catalog: Arc<InMemoryCatalog>,
    sequence: Arc<SteppedSequence>,
    events: Subscription<EventEnvelope<JsonValue>>,
    deliveries: DeliveriesProjection<Arc<InMemoryTenantStore<DeliveryId, DeliveryReadModel>>>,
    stock: StockLevelsProjection<Arc<InMemoryTenantStore<StockKey, StockLevel>>>,
    tenant_id: TenantId,
    party_id: PartyId,
    lonely_party_id: PartyId,
    warehouse: Warehouse,
    customer_location: LocationId,
    product_id: ProductId,
    service_product_id: ProductId,
    today: NaiveDate,
}

impl World {
    fn new() -> Self {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let events = bus.subscribe();
        let store = Arc::new(InMemoryEventStore::new());
        let dispatcher = CommandDispatcher::new(store.clone(), bus.clone());
        let catalog = Arc::new(InMemoryCatalog::new());
        let sequence = Arc::new(SteppedSequence::default());

        let tenant_id = TenantId::new();
        let category = UomCategoryId::generate();
        let unit = Uom {
            id: UomId::generate(),
            name: "Unit".to_string(),
            symbol: "u".to_string(),
            digits: 0,
            category,
        };
        let vat = Tax::percentage(TaxId::generate(), "IVA 12%", dec!(0.12));
        let vat_id = vat.id;
        catalog.upsert_uom(tenant_id, unit.clone()).unwrap();
        catalog.upsert_tax(tenant_id, vat).unwrap();

        let warehouse = Warehouse {
            id: LocationId::generate(),
            name: "Main".to_string(),
            input_location: LocationId::generate(),
            output_location: LocationId::generate(),
            storage_location: LocationId::generate(),
        };
        catalog.upsert_warehouse(tenant_id, warehouse.clone()).unwrap();

        let customer_location = LocationId::generate();
        let party = |location| Party {
            id: PartyId::generate(),
            name: "Distribuidora Andina".to_string(),
            lang: Some("es".to_string()),
            customer_location: location,
            customer_tax_rule: None,
        };
        let (with_location, without_location) = (party(Some(customer_location)), party(None));
        let (party_id, lonely_party_id) = (with_location.id, without_location.id);
        catalog.upsert_party(tenant_id, with_location).unwrap();
        catalog.upsert_party(tenant_id, without_location).unwrap();

        let product = |kind, name: &str| Product {
            id: ProductId::generate(),
            code: Some("GAS15".to_string()),
            name: name.to_string(),
            kind,
            sale_uom: unit.clone(),
            list_price: dec!(10),
            customer_taxes: vec![vat_id],
            delivery_lead_days: 2,
            salable: true,
        };
        let goods = product(ProductKind::Goods, "Gas cylinder 15kg");
        let service = product(ProductKind::Service, "Installation");
        let (product_id, service_product_id) = (goods.id, service.id);
        catalog.upsert_product(tenant_id, goods).unwrap();
        catalog.upsert_product(tenant_id, service).unwrap();

        let seq: Arc<dyn NumberSequence> = sequence.clone();
        let service =
            DeliveryService::new(dispatcher, catalog.clone(), seq, DeliveryConfig::default());

        Self {
            service,
            store,
            bus,
            catalog,
            sequence,
            events,
            deliveries: DeliveriesProjection::new(Arc::new(InMemoryTenantStore::new())),
            stock: StockLevelsProjection::new(Arc::new(InMemoryTenantStore::new())),
            tenant_id,
            party_id,
            lonely_party_id,
            warehouse,
            customer_location,
            product_id,
            service_product_id,
            today: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        }
    }

    /// A second service over the same store, bus and catalog, standing in
    /// for another request handler.
    fn other_handler(&self) -> Service {
        DeliveryService::new(
            CommandDispatcher::new(self.store.clone(), self.bus.clone()),
            self.catalog.clone(),
            Arc::new(InMemoryNumberSequence::default()),
            DeliveryConfig::default(),
        )
    }

    fn pump(&self) {
        while let Ok(env) = self.events.try_recv() {
            self.deliveries.apply_envelope(&env).unwrap();
            self.stock.apply_envelope(&env).unwrap();
        }
    }

    fn create(&self, party_id: PartyId) -> DeliveryId {
        self.service
            .create(
                self.tenant_id,
                DeliveryHeader {
                    party_id,
                    warehouse_id: self.warehouse.id,
                    currency: None,
                    delivery_date: None,
                    comment: Some("morning route".to_string()),
                },
            )
            .unwrap()
            .id_typed()
    }

    fn lot(&self, number: &str) -> LotId {
        self.service
            .register_lot(self.tenant_id, self.product_id, number)
            .unwrap()
            .id_typed()
    }

    fn goods_line(&self, lot_id: Option<LotId>) -> LineRequest {
        LineRequest {
            product_id: Some(self.product_id),
            quantity: dec!(2),
            lot_id,
            ..LineRequest::default()
        }
    }

    fn stock_at(&self, location_id: LocationId) -> Option<rust_decimal::Decimal> {
        self.stock
            .get(
                self.tenant_id,
                &StockKey {
                    location_id,
                    product_id: self.product_id,
                },
            )
            .map(|l| l.quantity)
    }
}

#[test]
fn save_then_consolidate_moves_goods_and_releases_lot() {
    let w = World::new();
    let id = w.create(w.party_id);
    let lot_id = w.lot("L-001");

    let delivery = w.service.add_line(w.tenant_id, id, w.goods_line(Some(lot_id))).unwrap();
    let line = &delivery.lines()[0];
    assert_eq!(line.description, "[GAS15] Gas cylinder 15kg");
    assert_eq!(line.unit_price, dec!(10));
    assert_eq!(line.taxes.len(), 1);

    let totals = w.service.totals(w.tenant_id, id).unwrap();
    assert_eq!((totals.untaxed, totals.tax, totals.total), (dec!(20), dec!(2.40), dec!(22.40)));

    let saved = w.service.save(w.tenant_id, id, w.today).unwrap();
    assert_eq!(saved.status(), DeliveryStatus::Saved);
    assert_eq!(saved.number(), Some("000000001"));
    assert!(w.service.lot(w.tenant_id, lot_id).unwrap().is_used());
    assert_eq!(saved.moves()[0].planned_date, NaiveDate::from_ymd_opt(2024, 6, 5));

    w.pump();
    assert_eq!(w.stock_at(w.warehouse.output_location), Some(dec!(-2)));
    assert_eq!(w.stock_at(w.customer_location), Some(dec!(2)));

    let consolidation = w.service.consolidate(w.tenant_id, id, w.today).unwrap();
    assert_eq!(consolidation.delivery.status(), DeliveryStatus::Invoiced);
    assert_eq!(consolidation.draft.total_amount, dec!(22.40));
    assert_eq!(consolidation.draft.lines.len(), 1);
    assert!(!w.service.lot(w.tenant_id, lot_id).unwrap().is_used());

    w.pump();
    assert_eq!(w.stock_at(w.warehouse.output_location), Some(dec!(0)));
    assert_eq!(w.stock_at(w.customer_location), Some(dec!(0)));

    let row = w.deliveries.get(w.tenant_id, &id).unwrap();
    assert_eq!(row.status, DeliveryStatus::Invoiced);
    assert_eq!(row.number.as_deref(), Some("000000001"));
    assert_eq!(row.totals.map(|t| t.total), Some(dec!(22.40)));
    assert_eq!(row.line_count, 1);
}

#[test]
fn rejected_save_does_not_draw_a_number() {
    let w = World::new();
    let id = w.create(w.party_id);
    w.service.add_line(w.tenant_id, id, w.goods_line(None)).unwrap();

    let err = w.service.save(w.tenant_id, id, w.today).unwrap_err();
    assert!(matches!(err, ServiceError::Validation(ref m) if m.contains("requires a lot")));
    assert_eq!(w.sequence.peek(w.tenant_id, w.warehouse.id).unwrap(), 1);

    let other = w.create(w.lonely_party_id);
    let lot_id = w.lot("L-002");
    w.service.add_line(w.tenant_id, other, w.goods_line(Some(lot_id))).unwrap();
    let err = w.service.save(w.tenant_id, other, w.today).unwrap_err();
    assert!(matches!(err, ServiceError::Validation(ref m) if m.contains("customer location")));
    assert!(!w.service.lot(w.tenant_id, lot_id).unwrap().is_used());
    assert_eq!(w.sequence.peek(w.tenant_id, w.warehouse.id).unwrap(), 1);
}

#[test]
fn numbers_increase_per_warehouse() {
    let w = World::new();
    let mut numbers = Vec::new();
    for n in 0..3 {
        let id = w.create(w.party_id);
        let lot_id = w.lot(&format!("L-{n}"));
        w.service.add_line(w.tenant_id, id, w.goods_line(Some(lot_id))).unwrap();
        let saved = w.service.save(w.tenant_id, id, w.today).unwrap();
        numbers.push(saved.number().map(str::to_string));
    }
    assert_eq!(
        numbers,
        vec![
            Some("000000001".to_string()),
            Some("000000002".to_string()),
            Some("000000003".to_string())
        ]
    );
}

#[test]
fn a_used_lot_cannot_be_shipped_twice() {
    let w = World::new();
    let lot_id = w.lot("L-777");

    let first = w.create(w.party_id);
    let second = w.create(w.party_id);
    w.service.add_line(w.tenant_id, first, w.goods_line(Some(lot_id))).unwrap();
    w.service.add_line(w.tenant_id, second, w.goods_line(Some(lot_id))).unwrap();

    w.service.save(w.tenant_id, first, w.today).unwrap();
    let err = w.service.save(w.tenant_id, second, w.today).unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(
        w.service.get(w.tenant_id, second).unwrap().status(),
        DeliveryStatus::Draft
    );

    let err = w
        .service
        .add_line(w.tenant_id, second, w.goods_line(Some(lot_id)))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[test]
fn service_lines_need_no_lot_and_move_nothing() {
    let w = World::new();
    let id = w.create(w.lonely_party_id);
    w.service
        .add_line(
            w.tenant_id,
            id,
            LineRequest {
                product_id: Some(w.service_product_id),
                quantity: dec!(1),
                ..LineRequest::default()
            },
        )
        .unwrap();

    let saved = w.service.save(w.tenant_id, id, w.today).unwrap();
    assert!(saved.moves().is_empty());
    w.pump();
    assert!(w.stock.list(w.tenant_id).is_empty());
}

#[test]
fn annulling_a_saved_delivery_returns_goods() {
    let w = World::new();
    let id = w.create(w.party_id);
    let lot_id = w.lot("L-050");
    w.service.add_line(w.tenant_id, id, w.goods_line(Some(lot_id))).unwrap();
    w.service.save(w.tenant_id, id, w.today).unwrap();

    let annulled = w.service.annul(w.tenant_id, id, w.today).unwrap();
    assert_eq!(annulled.status(), DeliveryStatus::Anulled);
    assert!(!w.service.lot(w.tenant_id, lot_id).unwrap().is_used());

    w.pump();
    assert_eq!(w.stock_at(w.customer_location), Some(dec!(0)));

    let err = w.service.consolidate(w.tenant_id, id, w.today).unwrap_err();
    assert!(matches!(err, ServiceError::InvariantViolation(_)));
}

#[test]
fn report_spells_out_the_total() {
    let w = World::new();
    let id = w.create(w.party_id);
    w.service.add_line(w.tenant_id, id, w.goods_line(None)).unwrap();

    let report = w.service.report(w.tenant_id, id).unwrap();
    assert_eq!(report.subtotal_12, dec!(20));
    assert_eq!(report.amount_in_words, "VEINTIDÓS");
    assert_eq!(report.decimals, "40");
    assert_eq!(report.company, "Company");
}

#[test]
fn other_tenants_see_nothing() {
    let w = World::new();
    let id = w.create(w.party_id);

    let err = w.service.get(TenantId::new(), id).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("delivery")));

    let err = w
        .service
        .create(
            TenantId::new(),
            DeliveryHeader {
                party_id: w.party_id,
                warehouse_id: w.warehouse.id,
                currency: None,
                delivery_date: None,
                comment: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("party")));
}

#[test]
fn draft_edits_are_blocked_after_save() {
    let w = World::new();
    let id = w.create(w.lonely_party_id);
    let delivery = w
        .service
        .add_line(
            w.tenant_id,
            id,
            LineRequest {
                product_id: None,
                quantity: dec!(1),
                unit_price: Some(dec!(3.123456)),
                description: Some("Freight".to_string()),
                ..LineRequest::default()
            },
        )
        .unwrap();
    assert_eq!(delivery.lines()[0].unit_price, dec!(3.1235));

    w.service.save(w.tenant_id, id, w.today).unwrap();
    let err = w.service.remove_line(w.tenant_id, id, 1).unwrap_err();
    assert!(matches!(err, ServiceError::InvariantViolation(_)));
    let err = w.service.remove_line(w.tenant_id, id, 9).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("line")));
}

#[test]
fn save_refuses_a_lot_swap_that_lands_after_reservation() {
    let w = World::new();
    let (first_lot, second_lot) = (w.lot("L-100"), w.lot("L-200"));
    let id = w.create(w.party_id);
    w.service.add_line(w.tenant_id, id, w.goods_line(Some(first_lot))).unwrap();

    let editor = w.other_handler();
    let (tenant_id, swap) = (w.tenant_id, w.goods_line(Some(second_lot)));
    w.sequence.before_next(move || {
        editor.update_line(tenant_id, id, 1, swap).unwrap();
    });

    let err = w.service.save(w.tenant_id, id, w.today).unwrap_err();
    assert!(matches!(err, ServiceError::Concurrency(_)), "{err:?}");

    let delivery = w.service.get(w.tenant_id, id).unwrap();
    assert_eq!(delivery.status(), DeliveryStatus::Draft);
    assert_eq!(delivery.line(1).unwrap().lot_id, Some(second_lot));
    assert!(!w.service.lot(w.tenant_id, first_lot).unwrap().is_used());
    assert!(!w.service.lot(w.tenant_id, second_lot).unwrap().is_used());

    let saved = w.service.save(w.tenant_id, id, w.today).unwrap();
    assert_eq!(saved.moves()[0].lot_id, second_lot);
    assert!(w.service.lot(w.tenant_id, second_lot).unwrap().is_used());
}

#[test]
fn products_that_are_not_salable_cannot_be_put_on_a_line() {
    let w = World::new();
    let mut retired = w.catalog.product(w.tenant_id, w.product_id).unwrap();
    retired.id = ProductId::generate();
    retired.salable = false;
    let retired_id = retired.id;
    w.catalog.upsert_product(w.tenant_id, retired).unwrap();

    let id = w.create(w.party_id);
    let err = w
        .service
        .add_line(
            w.tenant_id,
            id,
            LineRequest {
                product_id: Some(retired_id),
                quantity: dec!(1),
                ..LineRequest::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(ref m) if m.contains("not salable")));
    assert!(w.service.get(w.tenant_id, id).unwrap().lines().is_empty());
}

#[test]
fn a_unit_from_another_category_falls_back_to_the_sale_unit() {
    let w = World::new();
    let kilogram = Uom {
        id: UomId::generate(),
        name: "Kg".to_string(),
        symbol: "kg".to_string(),
        digits: 3,
        category: UomCategoryId::generate(),
    };
    w.catalog.upsert_uom(w.tenant_id, kilogram.clone()).unwrap();

    let id = w.create(w.party_id);
    let delivery = w
        .service
        .add_line(
            w.tenant_id,
            id,
            LineRequest {
                unit_id: Some(kilogram.id),
                ..w.goods_line(None)
            },
        )
        .unwrap();
    let unit = delivery.lines()[0].unit.as_ref().unwrap();
    assert_eq!(unit.symbol, "u");
}

#[test]
fn oversized_lines_are_rejected_and_the_delivery_stays_readable() {
    let w = World::new();
    let id = w.create(w.party_id);
    w.service.add_line(w.tenant_id, id, w.goods_line(None)).unwrap();

    let err = w
        .service
        .add_line(
            w.tenant_id,
            id,
            LineRequest {
                quantity: dec!(100000000000000000000),
                unit_price: Some(dec!(10000000000)),
                ..w.goods_line(None)
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let totals = w.service.totals(w.tenant_id, id).unwrap();
    assert_eq!(totals.total, dec!(22.40));
    assert!(w.service.report(w.tenant_id, id).is_ok());
}

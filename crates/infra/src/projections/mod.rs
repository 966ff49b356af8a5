//! Projection implementations (read model builders).
//!
//! Projections consume committed delivery events and build query-optimized
//! read models. All projections are:
//! - **Rebuildable**: can be reconstructed from the event stream
//! - **Tenant-isolated**: data is partitioned by tenant
//! - **Idempotent**: envelopes at or below the stream cursor are skipped

use serde_json::Value as JsonValue;
use thiserror::Error;

use deliverynote_core::TenantId;
use deliverynote_events::EventEnvelope;

pub mod cursor_store;
pub mod deliveries;
pub mod stock_levels;

pub use cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
pub use deliveries::{DeliveriesProjection, DeliveryReadModel};
pub use stock_levels::{StockKey, StockLevel, StockLevelsProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// A read model fed from event envelopes.
pub trait Projection {
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop every record and cursor of a tenant.
    fn reset_tenant(&self, tenant_id: TenantId);
}

/// Clear the tenants present in `envelopes` and replay them in stream order.
pub fn rebuild_from_scratch<P: Projection + ?Sized>(
    projection: &P,
    envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
) -> Result<(), ProjectionError> {
    let mut envs: Vec<_> = envelopes.into_iter().collect();

    let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
    tenants.sort();
    tenants.dedup();
    for tenant_id in tenants {
        projection.reset_tenant(tenant_id);
    }

    envs.sort_by_key(|e| (e.tenant_id(), e.aggregate_id(), e.sequence_number()));
    for env in &envs {
        projection.apply_envelope(env)?;
    }
    Ok(())
}

/// Whether an envelope at `seq` should be applied given the stream cursor.
///
/// Duplicates are skipped; a gap after the first seen event is an error.
pub(crate) fn should_apply(last: u64, seq: u64) -> Result<bool, ProjectionError> {
    if seq == 0 {
        return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
    }
    if seq <= last {
        return Ok(false);
    }
    if last != 0 && seq != last + 1 {
        return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
    }
    Ok(true)
}

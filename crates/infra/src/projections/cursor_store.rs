//! Projection cursor persistence.
//!
//! A cursor is the last applied sequence number of one stream for one
//! projection. Replays at or below it are ignored; clearing it allows a
//! deterministic rebuild.

use std::collections::HashMap;
use std::sync::RwLock;

use deliverynote_core::{AggregateId, TenantId};

pub trait ProjectionCursorStore: Send + Sync {
    fn get_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
    ) -> Option<u64>;

    fn update_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
        sequence_number: u64,
    );

    /// Clear all cursors for a tenant + projection.
    fn clear_cursors(&self, tenant_id: TenantId, projection_name: &str);
}

type CursorKey = (TenantId, AggregateId, String);

#[derive(Debug, Default)]
pub struct InMemoryCursorStore {
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectionCursorStore for InMemoryCursorStore {
    fn get_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
    ) -> Option<u64> {
        let cursors = self.cursors.read().ok()?;
        cursors
            .get(&(tenant_id, aggregate_id, projection_name.to_string()))
            .copied()
    }

    fn update_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
        sequence_number: u64,
    ) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                (tenant_id, aggregate_id, projection_name.to_string()),
                sequence_number,
            );
        }
    }

    fn clear_cursors(&self, tenant_id: TenantId, projection_name: &str) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|(t, _, name), _| !(*t == tenant_id && name == projection_name));
        }
    }
}

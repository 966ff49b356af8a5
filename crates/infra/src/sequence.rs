//! Delivery number counters, one per tenant and warehouse.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use deliverynote_core::TenantId;
use deliverynote_stock::LocationId;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("sequence exhausted for warehouse {0}")]
    Exhausted(LocationId),
    #[error("sequence storage unavailable: {0}")]
    Unavailable(String),
}

/// Hands out strictly increasing counter values.
///
/// Two calls for the same `(tenant, warehouse)` never return the same value.
pub trait NumberSequence: Send + Sync {
    fn next(&self, tenant_id: TenantId, warehouse_id: LocationId) -> Result<u64, SequenceError>;

    /// The value the next call would return, without consuming it.
    fn peek(&self, tenant_id: TenantId, warehouse_id: LocationId) -> Result<u64, SequenceError>;
}

impl<S> NumberSequence for Arc<S>
where
    S: NumberSequence + ?Sized,
{
    fn next(&self, tenant_id: TenantId, warehouse_id: LocationId) -> Result<u64, SequenceError> {
        (**self).next(tenant_id, warehouse_id)
    }

    fn peek(&self, tenant_id: TenantId, warehouse_id: LocationId) -> Result<u64, SequenceError> {
        (**self).peek(tenant_id, warehouse_id)
    }
}

#[derive(Debug)]
pub struct InMemoryNumberSequence {
    start: u64,
    counters: Mutex<HashMap<(TenantId, LocationId), u64>>,
}

impl InMemoryNumberSequence {
    pub fn new(start: u64) -> Self {
        Self {
            start,
            counters: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryNumberSequence {
    fn default() -> Self {
        Self::new(1)
    }
}

impl NumberSequence for InMemoryNumberSequence {
    fn next(&self, tenant_id: TenantId, warehouse_id: LocationId) -> Result<u64, SequenceError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| SequenceError::Unavailable("counter lock poisoned".to_string()))?;
        let slot = counters.entry((tenant_id, warehouse_id)).or_insert(self.start);
        let value = *slot;
        *slot = value
            .checked_add(1)
            .ok_or(SequenceError::Exhausted(warehouse_id))?;
        Ok(value)
    }

    fn peek(&self, tenant_id: TenantId, warehouse_id: LocationId) -> Result<u64, SequenceError> {
        let counters = self
            .counters
            .lock()
            .map_err(|_| SequenceError::Unavailable("counter lock poisoned".to_string()))?;
        Ok(counters
            .get(&(tenant_id, warehouse_id))
            .copied()
            .unwrap_or(self.start))
    }
}

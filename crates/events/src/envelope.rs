use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use deliverynote_core::{AggregateId, TenantId};

/// Where a committed event sits: its stream and its place in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPosition {
    pub aggregate_type: String,
    pub aggregate_id: AggregateId,
    /// 1-based; projections keep the last one they applied per stream.
    pub sequence_number: u64,
}

impl StreamPosition {
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: AggregateId,
        sequence_number: u64,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id,
            sequence_number,
        }
    }
}

/// A committed event as it travels over the bus to the read models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,
    position: StreamPosition,
    event_type: String,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        position: StreamPosition,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            position,
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn position(&self) -> &StreamPosition {
        &self.position
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.position.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.position.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.position.sequence_number
    }

    /// Whether the event belongs to a stream of `aggregate_type`.
    pub fn is_from(&self, aggregate_type: &str) -> bool {
        self.position.aggregate_type == aggregate_type
    }

    /// Stable event name, e.g. `delivery.note.saved`.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}

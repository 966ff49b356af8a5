use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use deliverynote_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use deliverynote_events::Event;
use deliverynote_products::ProductId;

deliverynote_core::domain_id!(
    /// Lot identifier (tenant-scoped via `tenant_id` fields in events/commands).
    LotId
);

/// Aggregate root: Lot.
///
/// A lot is a tracked batch of one product. It is reserved ("used") by the
/// outbound move of a saved delivery and released by the return move of a
/// consolidated or annulled one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lot {
    id: LotId,
    tenant_id: Option<TenantId>,
    product_id: Option<ProductId>,
    number: String,
    used: bool,
    version: u64,
    created: bool,
}

impl Lot {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: LotId) -> Self {
        Self {
            id,
            tenant_id: None,
            product_id: None,
            number: String::new(),
            used: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LotId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    /// Selection rule for delivery lines: an unused lot of the same product.
    pub fn is_available_for(&self, product_id: ProductId) -> bool {
        self.created && !self.used && self.product_id == Some(product_id)
    }
}

impl AggregateRoot for Lot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterLot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterLot {
    pub tenant_id: TenantId,
    pub lot_id: LotId,
    pub product_id: ProductId,
    pub number: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkLotUsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkLotUsed {
    pub tenant_id: TenantId,
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkLotAvailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkLotAvailable {
    pub tenant_id: TenantId,
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotCommand {
    RegisterLot(RegisterLot),
    MarkLotUsed(MarkLotUsed),
    MarkLotAvailable(MarkLotAvailable),
}

impl deliverynote_events::Command for LotCommand {
    fn target_aggregate_id(&self) -> deliverynote_core::AggregateId {
        match self {
            LotCommand::RegisterLot(c) => c.lot_id.0,
            LotCommand::MarkLotUsed(c) => c.lot_id.0,
            LotCommand::MarkLotAvailable(c) => c.lot_id.0,
        }
    }
}

/// Event: LotRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotRegistered {
    pub tenant_id: TenantId,
    pub lot_id: LotId,
    pub product_id: ProductId,
    pub number: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LotMarkedUsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotMarkedUsed {
    pub tenant_id: TenantId,
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LotMarkedAvailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotMarkedAvailable {
    pub tenant_id: TenantId,
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotEvent {
    LotRegistered(LotRegistered),
    LotMarkedUsed(LotMarkedUsed),
    LotMarkedAvailable(LotMarkedAvailable),
}

impl Event for LotEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LotEvent::LotRegistered(_) => "stock.lot.registered",
            LotEvent::LotMarkedUsed(_) => "stock.lot.marked_used",
            LotEvent::LotMarkedAvailable(_) => "stock.lot.marked_available",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LotEvent::LotRegistered(e) => e.occurred_at,
            LotEvent::LotMarkedUsed(e) => e.occurred_at,
            LotEvent::LotMarkedAvailable(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Lot {
    type Command = LotCommand;
    type Event = LotEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LotEvent::LotRegistered(e) => {
                self.id = e.lot_id;
                self.tenant_id = Some(e.tenant_id);
                self.product_id = Some(e.product_id);
                self.number = e.number.clone();
                self.used = false;
                self.created = true;
            }
            LotEvent::LotMarkedUsed(_) => {
                self.used = true;
            }
            LotEvent::LotMarkedAvailable(_) => {
                self.used = false;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LotCommand::RegisterLot(cmd) => self.handle_register(cmd),
            LotCommand::MarkLotUsed(cmd) => self.handle_mark_used(cmd),
            LotCommand::MarkLotAvailable(cmd) => self.handle_mark_available(cmd),
        }
    }
}

impl Lot {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_lot_id(&self, lot_id: LotId) -> Result<(), DomainError> {
        if self.id != lot_id {
            return Err(DomainError::invariant("lot_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterLot) -> Result<Vec<LotEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("lot already exists"));
        }
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("lot number cannot be empty"));
        }
        Ok(vec![LotEvent::LotRegistered(LotRegistered {
            tenant_id: cmd.tenant_id,
            lot_id: cmd.lot_id,
            product_id: cmd.product_id,
            number: cmd.number.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_used(&self, cmd: &MarkLotUsed) -> Result<Vec<LotEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("lot"));
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_lot_id(cmd.lot_id)?;

        if self.used {
            return Err(DomainError::invariant(format!(
                "lot {} is already used",
                self.number
            )));
        }

        Ok(vec![LotEvent::LotMarkedUsed(LotMarkedUsed {
            tenant_id: cmd.tenant_id,
            lot_id: cmd.lot_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_available(
        &self,
        cmd: &MarkLotAvailable,
    ) -> Result<Vec<LotEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("lot"));
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_lot_id(cmd.lot_id)?;

        if !self.used {
            return Ok(vec![]);
        }

        Ok(vec![LotEvent::LotMarkedAvailable(LotMarkedAvailable {
            tenant_id: cmd.tenant_id,
            lot_id: cmd.lot_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

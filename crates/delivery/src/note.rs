use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use deliverynote_core::{Aggregate, AggregateRoot, Currency, DomainError, TenantId};
use deliverynote_events::Event;
use deliverynote_parties::PartyId;
use deliverynote_stock::{LocationId, LotId, MoveDirection, MoveOrigin, StockMove};
use deliverynote_taxes::TaxRounding;

use crate::line::{DeliveryLine, LineInput, MoveRouting};
use crate::totals::DeliveryTotals;

/// Most lines a single delivery may hold.
pub const MAX_DELIVERY_LINES: usize = 10_000;

deliverynote_core::domain_id!(
    /// Delivery note identifier (tenant-scoped via `tenant_id` fields in events/commands).
    DeliveryId
);

/// Delivery note status lifecycle.
///
/// `draft` → `saved` → `invoiced`; `draft` or `saved` → `anulled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Draft,
    Saved,
    Anulled,
    Invoiced,
}

impl DeliveryStatus {
    /// Terminal states keep the totals computed when they were entered.
    pub fn caches_totals(self) -> bool {
        matches!(self, DeliveryStatus::Invoiced | DeliveryStatus::Anulled)
    }
}

/// Aggregate root: Delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    id: DeliveryId,
    tenant_id: Option<TenantId>,
    party_id: Option<PartyId>,
    warehouse_id: Option<LocationId>,
    currency: Option<Currency>,
    status: DeliveryStatus,
    number: Option<String>,
    delivery_date: Option<NaiveDate>,
    comment: Option<String>,
    lines: Vec<DeliveryLine>,
    next_line_no: u32,
    cached_totals: Option<DeliveryTotals>,
    moves: Vec<StockMove>,
    version: u64,
    created: bool,
}

impl Delivery {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DeliveryId) -> Self {
        Self {
            id,
            tenant_id: None,
            party_id: None,
            warehouse_id: None,
            currency: None,
            status: DeliveryStatus::Draft,
            number: None,
            delivery_date: None,
            comment: None,
            lines: Vec::new(),
            next_line_no: 1,
            cached_totals: None,
            moves: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DeliveryId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn party_id(&self) -> Option<PartyId> {
        self.party_id
    }

    pub fn warehouse_id(&self) -> Option<LocationId> {
        self.warehouse_id
    }

    pub fn currency(&self) -> Option<&Currency> {
        self.currency.as_ref()
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    pub fn delivery_date(&self) -> Option<NaiveDate> {
        self.delivery_date
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn lines(&self) -> &[DeliveryLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&DeliveryLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    /// Every stock move generated so far, outbound and return.
    pub fn moves(&self) -> &[StockMove] {
        &self.moves
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, DeliveryStatus::Draft)
    }

    /// Lots referenced by lines that move goods.
    pub fn lot_ids(&self) -> Vec<LotId> {
        self.lines
            .iter()
            .filter(|l| l.moves_goods())
            .filter_map(|l| l.lot_id)
            .collect()
    }

    /// Totals recomputed from the lines.
    pub fn compute_totals(&self, rounding: TaxRounding) -> DeliveryTotals {
        match &self.currency {
            Some(currency) => DeliveryTotals::compute(&self.lines, currency, rounding),
            None => DeliveryTotals::default(),
        }
    }

    /// Totals as shown to users: frozen in terminal states, live otherwise.
    pub fn totals(&self, rounding: TaxRounding) -> DeliveryTotals {
        if self.status.caches_totals() {
            if let Some(cached) = self.cached_totals {
                return cached;
            }
        }
        self.compute_totals(rounding)
    }
}

impl AggregateRoot for Delivery {
    type Id = DeliveryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateDelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDelivery {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub party_id: PartyId,
    pub warehouse_id: LocationId,
    pub currency: Currency,
    pub delivery_date: Option<NaiveDate>,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDelivery (header fields, full replacement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDelivery {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub party_id: PartyId,
    pub warehouse_id: LocationId,
    pub currency: Currency,
    pub delivery_date: Option<NaiveDate>,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub line: LineInput,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLine {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub line_no: u32,
    pub line: LineInput,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SaveDelivery. Ships the goods and assigns `number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveDelivery {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub number: String,
    pub routing: MoveRouting,
    pub today: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConsolidateDelivery. Brings the goods back for invoicing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidateDelivery {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub routing: MoveRouting,
    pub today: NaiveDate,
    pub tax_rounding: TaxRounding,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AnnulDelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnulDelivery {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub routing: MoveRouting,
    pub today: NaiveDate,
    pub tax_rounding: TaxRounding,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryCommand {
    CreateDelivery(CreateDelivery),
    UpdateDelivery(UpdateDelivery),
    AddLine(AddLine),
    UpdateLine(UpdateLine),
    RemoveLine(RemoveLine),
    SaveDelivery(SaveDelivery),
    ConsolidateDelivery(ConsolidateDelivery),
    AnnulDelivery(AnnulDelivery),
}

impl deliverynote_events::Command for DeliveryCommand {
    fn target_aggregate_id(&self) -> deliverynote_core::AggregateId {
        let id = match self {
            DeliveryCommand::CreateDelivery(c) => c.delivery_id,
            DeliveryCommand::UpdateDelivery(c) => c.delivery_id,
            DeliveryCommand::AddLine(c) => c.delivery_id,
            DeliveryCommand::UpdateLine(c) => c.delivery_id,
            DeliveryCommand::RemoveLine(c) => c.delivery_id,
            DeliveryCommand::SaveDelivery(c) => c.delivery_id,
            DeliveryCommand::ConsolidateDelivery(c) => c.delivery_id,
            DeliveryCommand::AnnulDelivery(c) => c.delivery_id,
        };
        id.0
    }
}

/// Event: DeliveryCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCreated {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub party_id: PartyId,
    pub warehouse_id: LocationId,
    pub currency: Currency,
    pub delivery_date: Option<NaiveDate>,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryUpdated {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub party_id: PartyId,
    pub warehouse_id: LocationId,
    pub currency: Currency,
    pub delivery_date: Option<NaiveDate>,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub line: DeliveryLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineUpdated {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub line: DeliveryLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliverySaved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySaved {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub number: String,
    pub moves: Vec<StockMove>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryConsolidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConsolidated {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub moves: Vec<StockMove>,
    pub totals: DeliveryTotals,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryAnnulled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAnnulled {
    pub tenant_id: TenantId,
    pub delivery_id: DeliveryId,
    pub moves: Vec<StockMove>,
    pub totals: DeliveryTotals,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryEvent {
    DeliveryCreated(DeliveryCreated),
    DeliveryUpdated(DeliveryUpdated),
    LineAdded(LineAdded),
    LineUpdated(LineUpdated),
    LineRemoved(LineRemoved),
    DeliverySaved(DeliverySaved),
    DeliveryConsolidated(DeliveryConsolidated),
    DeliveryAnnulled(DeliveryAnnulled),
}

impl DeliveryEvent {
    /// Stock moves carried by the event, if any.
    pub fn moves(&self) -> &[StockMove] {
        match self {
            DeliveryEvent::DeliverySaved(e) => &e.moves,
            DeliveryEvent::DeliveryConsolidated(e) => &e.moves,
            DeliveryEvent::DeliveryAnnulled(e) => &e.moves,
            _ => &[],
        }
    }
}

impl Event for DeliveryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DeliveryEvent::DeliveryCreated(_) => "delivery.note.created",
            DeliveryEvent::DeliveryUpdated(_) => "delivery.note.updated",
            DeliveryEvent::LineAdded(_) => "delivery.note.line_added",
            DeliveryEvent::LineUpdated(_) => "delivery.note.line_updated",
            DeliveryEvent::LineRemoved(_) => "delivery.note.line_removed",
            DeliveryEvent::DeliverySaved(_) => "delivery.note.saved",
            DeliveryEvent::DeliveryConsolidated(_) => "delivery.note.consolidated",
            DeliveryEvent::DeliveryAnnulled(_) => "delivery.note.annulled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DeliveryEvent::DeliveryCreated(e) => e.occurred_at,
            DeliveryEvent::DeliveryUpdated(e) => e.occurred_at,
            DeliveryEvent::LineAdded(e) => e.occurred_at,
            DeliveryEvent::LineUpdated(e) => e.occurred_at,
            DeliveryEvent::LineRemoved(e) => e.occurred_at,
            DeliveryEvent::DeliverySaved(e) => e.occurred_at,
            DeliveryEvent::DeliveryConsolidated(e) => e.occurred_at,
            DeliveryEvent::DeliveryAnnulled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Delivery {
    type Command = DeliveryCommand;
    type Event = DeliveryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DeliveryEvent::DeliveryCreated(e) => {
                self.id = e.delivery_id;
                self.tenant_id = Some(e.tenant_id);
                self.party_id = Some(e.party_id);
                self.warehouse_id = Some(e.warehouse_id);
                self.currency = Some(e.currency.clone());
                self.delivery_date = e.delivery_date;
                self.comment = e.comment.clone();
                self.status = DeliveryStatus::Draft;
                self.lines.clear();
                self.next_line_no = 1;
                self.created = true;
            }
            DeliveryEvent::DeliveryUpdated(e) => {
                self.party_id = Some(e.party_id);
                self.warehouse_id = Some(e.warehouse_id);
                self.currency = Some(e.currency.clone());
                self.delivery_date = e.delivery_date;
                self.comment = e.comment.clone();
            }
            DeliveryEvent::LineAdded(e) => {
                self.next_line_no = self.next_line_no.max(e.line.line_no + 1);
                self.lines.push(e.line.clone());
            }
            DeliveryEvent::LineUpdated(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line.line_no) {
                    *line = e.line.clone();
                }
            }
            DeliveryEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            DeliveryEvent::DeliverySaved(e) => {
                self.number = Some(e.number.clone());
                self.moves.extend(e.moves.iter().cloned());
                self.status = DeliveryStatus::Saved;
            }
            DeliveryEvent::DeliveryConsolidated(e) => {
                self.moves.extend(e.moves.iter().cloned());
                self.cached_totals = Some(e.totals);
                self.status = DeliveryStatus::Invoiced;
            }
            DeliveryEvent::DeliveryAnnulled(e) => {
                self.moves.extend(e.moves.iter().cloned());
                self.cached_totals = Some(e.totals);
                self.status = DeliveryStatus::Anulled;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DeliveryCommand::CreateDelivery(cmd) => self.handle_create(cmd),
            DeliveryCommand::UpdateDelivery(cmd) => self.handle_update(cmd),
            DeliveryCommand::AddLine(cmd) => self.handle_add_line(cmd),
            DeliveryCommand::UpdateLine(cmd) => self.handle_update_line(cmd),
            DeliveryCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            DeliveryCommand::SaveDelivery(cmd) => self.handle_save(cmd),
            DeliveryCommand::ConsolidateDelivery(cmd) => self.handle_consolidate(cmd),
            DeliveryCommand::AnnulDelivery(cmd) => self.handle_annul(cmd),
        }
    }
}

impl Delivery {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_delivery_id(&self, delivery_id: DeliveryId) -> Result<(), DomainError> {
        if self.id != delivery_id {
            return Err(DomainError::invariant("delivery_id mismatch"));
        }
        Ok(())
    }

    fn ensure_existing(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("delivery"));
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_delivery_id(delivery_id)
    }

    fn ensure_modifiable(&self) -> Result<(), DomainError> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(
                "cannot modify a delivery once it is saved, invoiced or annulled",
            ));
        }
        Ok(())
    }

    fn ensure_routing(&self, routing: &MoveRouting) -> Result<(), DomainError> {
        if self.warehouse_id != Some(routing.warehouse.id) {
            return Err(DomainError::invariant(
                "routing warehouse does not match the delivery warehouse",
            ));
        }
        Ok(())
    }

    /// Stock moves for every goods line, marked done on `today`.
    ///
    /// Outbound moves follow the line locations; return moves swap them.
    fn build_moves(
        &self,
        direction: MoveDirection,
        routing: &MoveRouting,
        today: NaiveDate,
    ) -> Result<Vec<StockMove>, DomainError> {
        let currency = self
            .currency
            .as_ref()
            .map(|c| c.code().to_string())
            .unwrap_or_default();

        let mut moves = Vec::new();
        let mut seen_lots: Vec<LotId> = Vec::new();

        for line in self.lines.iter().filter(|l| l.moves_goods()) {
            let Some(product) = &line.product else {
                continue;
            };
            let customer_location = routing.customer_location.ok_or_else(|| {
                DomainError::validation("the party has no customer location")
            })?;
            let lot_id = line.lot_id.ok_or_else(|| {
                DomainError::validation(format!("line {} requires a lot", line.line_no))
            })?;
            if seen_lots.contains(&lot_id) {
                return Err(DomainError::validation(format!(
                    "lot {lot_id} is used on more than one line"
                )));
            }
            seen_lots.push(lot_id);

            let (from, to) = line.locations(&routing.warehouse, customer_location);
            let (from_location, to_location) = match direction {
                MoveDirection::Outbound => (from, to),
                MoveDirection::Return => (to, from),
            };

            let mv = StockMove {
                origin: MoveOrigin {
                    delivery_id: self.id.0,
                    line_no: line.line_no,
                },
                direction,
                product_id: product.id,
                quantity: line.quantity.abs(),
                uom: line.unit.as_ref().map(|u| u.id),
                from_location,
                to_location,
                lot_id,
                unit_price: line.unit_price,
                currency: currency.clone(),
                planned_date: line.planned_date(self.delivery_date, today),
                effective_date: None,
                state: deliverynote_stock::MoveState::Draft,
            };
            moves.push(mv.done(today));
        }

        Ok(moves)
    }

    fn handle_create(&self, cmd: &CreateDelivery) -> Result<Vec<DeliveryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("delivery already exists"));
        }

        Ok(vec![DeliveryEvent::DeliveryCreated(DeliveryCreated {
            tenant_id: cmd.tenant_id,
            delivery_id: cmd.delivery_id,
            party_id: cmd.party_id,
            warehouse_id: cmd.warehouse_id,
            currency: cmd.currency.clone(),
            delivery_date: cmd.delivery_date,
            comment: cmd.comment.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDelivery) -> Result<Vec<DeliveryEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.delivery_id)?;
        self.ensure_modifiable()?;

        if !self.lines.is_empty() {
            if self.party_id != Some(cmd.party_id) {
                return Err(DomainError::invariant(
                    "party cannot change once the delivery has lines",
                ));
            }
            if self.currency.as_ref() != Some(&cmd.currency) {
                return Err(DomainError::invariant(
                    "currency cannot change once the delivery has lines",
                ));
            }
        }

        Ok(vec![DeliveryEvent::DeliveryUpdated(DeliveryUpdated {
            tenant_id: cmd.tenant_id,
            delivery_id: cmd.delivery_id,
            party_id: cmd.party_id,
            warehouse_id: cmd.warehouse_id,
            currency: cmd.currency.clone(),
            delivery_date: cmd.delivery_date,
            comment: cmd.comment.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<DeliveryEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.delivery_id)?;
        self.ensure_modifiable()?;

        if self.lines.len() >= MAX_DELIVERY_LINES {
            return Err(DomainError::validation(format!(
                "a delivery holds at most {MAX_DELIVERY_LINES} lines"
            )));
        }
        let line = cmd.line.clone().into_line(self.next_line_no)?;

        Ok(vec![DeliveryEvent::LineAdded(LineAdded {
            tenant_id: cmd.tenant_id,
            delivery_id: cmd.delivery_id,
            line,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_line(&self, cmd: &UpdateLine) -> Result<Vec<DeliveryEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.delivery_id)?;
        self.ensure_modifiable()?;

        if self.line(cmd.line_no).is_none() {
            return Err(DomainError::not_found("delivery line"));
        }
        let line = cmd.line.clone().into_line(cmd.line_no)?;

        Ok(vec![DeliveryEvent::LineUpdated(LineUpdated {
            tenant_id: cmd.tenant_id,
            delivery_id: cmd.delivery_id,
            line,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<DeliveryEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.delivery_id)?;
        self.ensure_modifiable()?;

        if self.line(cmd.line_no).is_none() {
            return Err(DomainError::not_found("delivery line"));
        }

        Ok(vec![DeliveryEvent::LineRemoved(LineRemoved {
            tenant_id: cmd.tenant_id,
            delivery_id: cmd.delivery_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_save(&self, cmd: &SaveDelivery) -> Result<Vec<DeliveryEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.delivery_id)?;

        if self.status != DeliveryStatus::Draft {
            return Err(DomainError::invariant("only draft deliveries can be saved"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot save a delivery without lines"));
        }
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("delivery number cannot be empty"));
        }
        self.ensure_routing(&cmd.routing)?;

        let moves = self.build_moves(MoveDirection::Outbound, &cmd.routing, cmd.today)?;

        Ok(vec![DeliveryEvent::DeliverySaved(DeliverySaved {
            tenant_id: cmd.tenant_id,
            delivery_id: cmd.delivery_id,
            number: cmd.number.trim().to_string(),
            moves,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_consolidate(
        &self,
        cmd: &ConsolidateDelivery,
    ) -> Result<Vec<DeliveryEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.delivery_id)?;

        if self.status != DeliveryStatus::Saved {
            return Err(DomainError::invariant(
                "only saved deliveries can be consolidated",
            ));
        }
        self.ensure_routing(&cmd.routing)?;

        let moves = self.build_moves(MoveDirection::Return, &cmd.routing, cmd.today)?;

        Ok(vec![DeliveryEvent::DeliveryConsolidated(
            DeliveryConsolidated {
                tenant_id: cmd.tenant_id,
                delivery_id: cmd.delivery_id,
                moves,
                totals: self.compute_totals(cmd.tax_rounding),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_annul(&self, cmd: &AnnulDelivery) -> Result<Vec<DeliveryEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.delivery_id)?;

        let moves = match self.status {
            DeliveryStatus::Draft => Vec::new(),
            DeliveryStatus::Saved => {
                self.ensure_routing(&cmd.routing)?;
                self.build_moves(MoveDirection::Return, &cmd.routing, cmd.today)?
            }
            DeliveryStatus::Anulled | DeliveryStatus::Invoiced => {
                return Err(DomainError::invariant(
                    "only draft or saved deliveries can be annulled",
                ));
            }
        };

        Ok(vec![DeliveryEvent::DeliveryAnnulled(DeliveryAnnulled {
            tenant_id: cmd.tenant_id,
            delivery_id: cmd.delivery_id,
            moves,
            totals: self.compute_totals(cmd.tax_rounding),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deliverynote_events::execute;
    use deliverynote_products::{ProductId, ProductKind, Uom, UomCategoryId, UomId};
    use deliverynote_stock::{MoveState, Warehouse};
    use deliverynote_taxes::{Tax, TaxId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::line::{LineProduct, LineType};

    struct Fixture {
        tenant_id: TenantId,
        delivery_id: DeliveryId,
        warehouse: Warehouse,
        customer_location: LocationId,
        category: UomCategoryId,
        today: NaiveDate,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tenant_id: TenantId::new(),
                delivery_id: DeliveryId::generate(),
                warehouse: Warehouse {
                    id: LocationId::generate(),
                    name: "Main".to_string(),
                    input_location: LocationId::generate(),
                    output_location: LocationId::generate(),
                    storage_location: LocationId::generate(),
                },
                customer_location: LocationId::generate(),
                category: UomCategoryId::generate(),
                today: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            }
        }

        fn created(&self) -> Delivery {
            let mut delivery = Delivery::empty(self.delivery_id);
            execute(
                &mut delivery,
                &DeliveryCommand::CreateDelivery(CreateDelivery {
                    tenant_id: self.tenant_id,
                    delivery_id: self.delivery_id,
                    party_id: PartyId::generate(),
                    warehouse_id: self.warehouse.id,
                    currency: Currency::new("USD", 2).unwrap(),
                    delivery_date: None,
                    comment: None,
                    occurred_at: Utc::now(),
                }),
            )
            .unwrap();
            delivery
        }

        fn goods_line(&self, quantity: Decimal, lot_id: Option<LotId>) -> LineInput {
            LineInput {
                line_type: LineType::Line,
                product: Some(LineProduct {
                    id: ProductId::generate(),
                    kind: ProductKind::Goods,
                    lead_days: 1,
                    uom_category: self.category,
                }),
                quantity,
                unit: Some(Uom {
                    id: UomId::generate(),
                    name: "Unit".to_string(),
                    symbol: "u".to_string(),
                    digits: 0,
                    category: self.category,
                }),
                unit_price: dec!(10),
                lot_id,
                description: "Gas cylinder".to_string(),
                note: None,
                taxes: vec![Tax::percentage(TaxId::generate(), "VAT 12%", dec!(0.12))],
            }
        }

        fn add(&self, delivery: &mut Delivery, line: LineInput) -> Result<Vec<DeliveryEvent>, DomainError> {
            execute(
                delivery,
                &DeliveryCommand::AddLine(AddLine {
                    tenant_id: self.tenant_id,
                    delivery_id: self.delivery_id,
                    line,
                    occurred_at: Utc::now(),
                }),
            )
        }

        fn routing(&self) -> MoveRouting {
            MoveRouting {
                warehouse: self.warehouse.clone(),
                customer_location: Some(self.customer_location),
            }
        }

        fn save_cmd(&self) -> DeliveryCommand {
            DeliveryCommand::SaveDelivery(SaveDelivery {
                tenant_id: self.tenant_id,
                delivery_id: self.delivery_id,
                number: "000000001".to_string(),
                routing: self.routing(),
                today: self.today,
                occurred_at: Utc::now(),
            })
        }

        fn consolidate_cmd(&self) -> DeliveryCommand {
            DeliveryCommand::ConsolidateDelivery(ConsolidateDelivery {
                tenant_id: self.tenant_id,
                delivery_id: self.delivery_id,
                routing: self.routing(),
                today: self.today,
                tax_rounding: TaxRounding::Document,
                occurred_at: Utc::now(),
            })
        }

        fn annul_cmd(&self) -> DeliveryCommand {
            DeliveryCommand::AnnulDelivery(AnnulDelivery {
                tenant_id: self.tenant_id,
                delivery_id: self.delivery_id,
                routing: self.routing(),
                today: self.today,
                tax_rounding: TaxRounding::Document,
                occurred_at: Utc::now(),
            })
        }
    }

    #[test]
    fn create_delivery_starts_in_draft() {
        let fx = Fixture::new();
        let delivery = fx.created();

        assert!(delivery.exists());
        assert_eq!(delivery.status(), DeliveryStatus::Draft);
        assert_eq!(delivery.number(), None);
        assert_eq!(delivery.version(), 1);
        assert_eq!(delivery.currency().map(|c| c.digits()), Some(2));
    }

    #[test]
    fn create_twice_conflicts() {
        let fx = Fixture::new();
        let delivery = fx.created();
        let err = delivery
            .handle(&DeliveryCommand::CreateDelivery(CreateDelivery {
                tenant_id: fx.tenant_id,
                delivery_id: fx.delivery_id,
                party_id: PartyId::generate(),
                warehouse_id: fx.warehouse.id,
                currency: Currency::new("USD", 2).unwrap(),
                delivery_date: None,
                comment: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn lines_are_numbered_sequentially_and_never_reused() {
        let fx = Fixture::new();
        let mut delivery = fx.created();

        fx.add(&mut delivery, fx.goods_line(dec!(1), Some(LotId::generate()))).unwrap();
        fx.add(&mut delivery, fx.goods_line(dec!(2), Some(LotId::generate()))).unwrap();
        execute(
            &mut delivery,
            &DeliveryCommand::RemoveLine(RemoveLine {
                tenant_id: fx.tenant_id,
                delivery_id: fx.delivery_id,
                line_no: 2,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        fx.add(&mut delivery, fx.goods_line(dec!(3), Some(LotId::generate()))).unwrap();

        let numbers: Vec<u32> = delivery.lines().iter().map(|l| l.line_no).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn update_line_replaces_content() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(1), Some(LotId::generate()))).unwrap();

        let mut changed = fx.goods_line(dec!(5), Some(LotId::generate()));
        changed.description = "Refill".to_string();
        execute(
            &mut delivery,
            &DeliveryCommand::UpdateLine(UpdateLine {
                tenant_id: fx.tenant_id,
                delivery_id: fx.delivery_id,
                line_no: 1,
                line: changed,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let line = delivery.line(1).unwrap();
        assert_eq!(line.quantity, dec!(5));
        assert_eq!(line.description, "Refill");
    }

    #[test]
    fn party_is_read_only_once_lines_exist() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(1), Some(LotId::generate()))).unwrap();

        let err = delivery
            .handle(&DeliveryCommand::UpdateDelivery(UpdateDelivery {
                tenant_id: fx.tenant_id,
                delivery_id: fx.delivery_id,
                party_id: PartyId::generate(),
                warehouse_id: fx.warehouse.id,
                currency: Currency::new("USD", 2).unwrap(),
                delivery_date: None,
                comment: Some("call first".to_string()),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(msg) if msg.contains("party")));
    }

    #[test]
    fn save_creates_done_outbound_moves_and_assigns_number() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        let lot = LotId::generate();
        fx.add(&mut delivery, fx.goods_line(dec!(2), Some(lot))).unwrap();

        let events = execute(&mut delivery, &fx.save_cmd()).unwrap();
        assert_eq!(events.len(), 1);

        assert_eq!(delivery.status(), DeliveryStatus::Saved);
        assert_eq!(delivery.number(), Some("000000001"));

        let moves = delivery.moves();
        assert_eq!(moves.len(), 1);
        let mv = &moves[0];
        assert_eq!(mv.direction, MoveDirection::Outbound);
        assert_eq!(mv.from_location, fx.warehouse.output_location);
        assert_eq!(mv.to_location, fx.customer_location);
        assert_eq!(mv.lot_id, lot);
        assert_eq!(mv.state, MoveState::Done);
        assert_eq!(mv.effective_date, Some(fx.today));
        assert_eq!(mv.planned_date, NaiveDate::from_ymd_opt(2024, 3, 16));
        assert_eq!(mv.currency, "USD");
    }

    #[test]
    fn return_line_moves_from_customer_to_input() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(-1), Some(LotId::generate()))).unwrap();

        execute(&mut delivery, &fx.save_cmd()).unwrap();
        let mv = &delivery.moves()[0];
        assert_eq!(mv.from_location, fx.customer_location);
        assert_eq!(mv.to_location, fx.warehouse.input_location);
        assert_eq!(mv.quantity, dec!(1));
        assert_eq!(mv.planned_date, None);
    }

    #[test]
    fn consolidating_a_return_line_sends_goods_back_to_the_customer() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(-1), Some(LotId::generate()))).unwrap();
        execute(&mut delivery, &fx.save_cmd()).unwrap();
        execute(&mut delivery, &fx.consolidate_cmd()).unwrap();

        let back = &delivery.moves()[1];
        assert_eq!(back.direction, MoveDirection::Return);
        assert_eq!(back.from_location, fx.warehouse.input_location);
        assert_eq!(back.to_location, fx.customer_location);
        assert_eq!(back.quantity, dec!(1));
    }

    #[test]
    fn delivery_line_count_is_bounded() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        let mut free_text = fx.goods_line(dec!(1), None);
        free_text.product = None;
        free_text.unit = None;
        for _ in 0..MAX_DELIVERY_LINES {
            fx.add(&mut delivery, free_text.clone()).unwrap();
        }
        assert!(matches!(
            fx.add(&mut delivery, free_text),
            Err(DomainError::Validation(msg)) if msg.contains("at most")
        ));
    }

    #[test]
    fn save_requires_lot_and_customer_location() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(2), None)).unwrap();

        let err = delivery.handle(&fx.save_cmd()).unwrap_err();
        assert_eq!(err, DomainError::validation("line 1 requires a lot"));

        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(2), Some(LotId::generate()))).unwrap();
        let mut cmd = fx.save_cmd();
        if let DeliveryCommand::SaveDelivery(save) = &mut cmd {
            save.routing.customer_location = None;
        }
        let err = delivery.handle(&cmd).unwrap_err();
        assert_eq!(err, DomainError::validation("the party has no customer location"));
        assert_eq!(delivery.status(), DeliveryStatus::Draft);
    }

    #[test]
    fn service_and_free_text_lines_do_not_move_stock() {
        let fx = Fixture::new();
        let mut delivery = fx.created();

        let mut service = fx.goods_line(dec!(1), None);
        if let Some(p) = service.product.as_mut() {
            p.kind = ProductKind::Service;
        }
        fx.add(&mut delivery, service).unwrap();

        let mut text = fx.goods_line(dec!(1), None);
        text.product = None;
        text.unit = None;
        fx.add(&mut delivery, text).unwrap();

        execute(&mut delivery, &fx.save_cmd()).unwrap();
        assert!(delivery.moves().is_empty());
        assert_eq!(delivery.status(), DeliveryStatus::Saved);
    }

    #[test]
    fn same_lot_on_two_lines_is_rejected() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        let lot = LotId::generate();
        fx.add(&mut delivery, fx.goods_line(dec!(1), Some(lot))).unwrap();
        fx.add(&mut delivery, fx.goods_line(dec!(1), Some(lot))).unwrap();

        let err = delivery.handle(&fx.save_cmd()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("more than one line")));
    }

    #[test]
    fn saved_delivery_is_read_only_and_cannot_be_saved_again() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(1), Some(LotId::generate()))).unwrap();
        execute(&mut delivery, &fx.save_cmd()).unwrap();

        let err = fx
            .add(&mut delivery, fx.goods_line(dec!(1), Some(LotId::generate())))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let err = delivery.handle(&fx.save_cmd()).unwrap_err();
        assert_eq!(err, DomainError::invariant("only draft deliveries can be saved"));
    }

    #[test]
    fn consolidate_requires_saved_status() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(1), Some(LotId::generate()))).unwrap();

        let err = delivery.handle(&fx.consolidate_cmd()).unwrap_err();
        assert_eq!(
            err,
            DomainError::invariant("only saved deliveries can be consolidated")
        );
    }

    #[test]
    fn consolidate_returns_goods_and_freezes_totals() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(2), Some(LotId::generate()))).unwrap();
        execute(&mut delivery, &fx.save_cmd()).unwrap();
        execute(&mut delivery, &fx.consolidate_cmd()).unwrap();

        assert_eq!(delivery.status(), DeliveryStatus::Invoiced);
        let moves = delivery.moves();
        assert_eq!(moves.len(), 2);
        let back = &moves[1];
        assert_eq!(back.direction, MoveDirection::Return);
        assert_eq!(back.from_location, fx.customer_location);
        assert_eq!(back.to_location, fx.warehouse.output_location);

        let totals = delivery.totals(TaxRounding::Document);
        assert_eq!(totals.untaxed, dec!(20.00));
        assert_eq!(totals.tax, dec!(2.40));
        assert_eq!(totals.total, dec!(22.40));
    }

    #[test]
    fn cached_totals_only_trusted_in_terminal_states() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(2), Some(LotId::generate()))).unwrap();

        // Simulate a stale cache on a draft: it must be ignored.
        delivery.cached_totals = Some(DeliveryTotals::default());
        assert_eq!(delivery.totals(TaxRounding::Document).untaxed, dec!(20.00));

        execute(&mut delivery, &fx.annul_cmd()).unwrap();
        assert_eq!(delivery.status(), DeliveryStatus::Anulled);

        delivery.lines.clear();
        assert_eq!(delivery.totals(TaxRounding::Document).untaxed, dec!(20.00));
    }

    #[test]
    fn annul_after_save_returns_goods() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(1), Some(LotId::generate()))).unwrap();
        execute(&mut delivery, &fx.save_cmd()).unwrap();

        let events = execute(&mut delivery, &fx.annul_cmd()).unwrap();
        assert_eq!(events[0].moves().len(), 1);
        assert_eq!(events[0].moves()[0].direction, MoveDirection::Return);

        let err = delivery.handle(&fx.annul_cmd()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn other_tenant_is_rejected() {
        let fx = Fixture::new();
        let delivery = fx.created();
        let err = delivery
            .handle(&DeliveryCommand::RemoveLine(RemoveLine {
                tenant_id: TenantId::new(),
                delivery_id: fx.delivery_id,
                line_no: 1,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::invariant("tenant mismatch"));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        fx.add(&mut delivery, fx.goods_line(dec!(1), Some(LotId::generate()))).unwrap();

        let before = delivery.clone();
        let _ = delivery.handle(&fx.save_cmd()).unwrap();
        assert_eq!(delivery, before);
    }

    #[test]
    fn replay_rebuilds_the_same_state() {
        let fx = Fixture::new();
        let mut delivery = fx.created();
        let mut history = vec![];
        fx.add(&mut delivery, fx.goods_line(dec!(1), Some(LotId::generate())))
            .map(|evs| history.extend(evs))
            .unwrap();
        history.extend(execute(&mut delivery, &fx.save_cmd()).unwrap());

        let mut replayed = fx.created();
        for ev in &history {
            replayed.apply(ev);
        }
        assert_eq!(replayed, delivery);
    }
}

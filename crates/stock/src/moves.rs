use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use deliverynote_core::AggregateId;
use deliverynote_products::{ProductId, UomId};

use crate::location::LocationId;
use crate::lot::LotId;

/// Which way goods travel for a move generated from a delivery line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    /// Goods leave the company (save).
    Outbound,
    /// Goods come back (consolidate, annul after save).
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveState {
    Draft,
    Done,
}

/// The document line a move was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveOrigin {
    pub delivery_id: AggregateId,
    pub line_no: u32,
}

/// A stock movement of one product between two locations.
///
/// Moves carry no identifier of their own: the pair (origin, direction) is
/// unique within a delivery stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMove {
    pub origin: MoveOrigin,
    pub direction: MoveDirection,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub uom: Option<UomId>,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub lot_id: LotId,
    pub unit_price: Decimal,
    pub currency: String,
    pub planned_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
    pub state: MoveState,
}

impl StockMove {
    /// Mark the move done on `date`.
    pub fn done(mut self, date: NaiveDate) -> Self {
        self.effective_date = Some(date);
        self.state = MoveState::Done;
        self
    }

    pub fn is_done(&self) -> bool {
        self.state == MoveState::Done
    }

    /// Signed quantity change this move causes at `location`.
    pub fn delta_at(&self, location: LocationId) -> Decimal {
        let mut delta = Decimal::ZERO;
        if self.to_location == location {
            delta += self.quantity;
        }
        if self.from_location == location {
            delta -= self.quantity;
        }
        delta
    }
}

//! Stock domain module: locations, warehouses, lots and stock moves.
//!
//! Lots are event-sourced aggregates; moves are values produced by the
//! delivery aggregate and recorded by infra projections.

pub mod location;
pub mod lot;
pub mod moves;

pub use location::{LocationId, Warehouse};
pub use lot::{
    Lot, LotCommand, LotEvent, LotId, LotMarkedAvailable, LotMarkedUsed, LotRegistered,
    MarkLotAvailable, MarkLotUsed, RegisterLot,
};
pub use moves::{MoveDirection, MoveOrigin, MoveState, StockMove};

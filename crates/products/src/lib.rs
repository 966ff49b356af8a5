//! Products domain module: sellable products and their units of measure.
//!
//! Products are reference data for delivery lines; the delivery aggregate
//! keeps a snapshot of the fields it needs so later catalog edits do not
//! rewrite history.

pub mod product;
pub mod uom;

pub use product::{Product, ProductId, ProductKind};
pub use uom::{Uom, UomCategoryId, UomId};

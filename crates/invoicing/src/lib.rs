//! Invoicing domain module.
//!
//! Consolidating a delivery note opens a prefilled draft sale for the same
//! customer; this crate builds that draft.

pub mod draft;

pub use draft::{ConsolidationDraft, DraftLine, DraftState};

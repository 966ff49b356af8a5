//! Taxes: records, per-line computation, document aggregation and customer
//! tax rules.

pub mod rounding;
pub mod rule;
pub mod tax;

pub use rounding::{TaxAccumulator, TaxRounding};
pub use rule::{TaxRule, TaxRuleLine};
pub use tax::{Tax, TaxId, TaxKind, TaxLine, compute};

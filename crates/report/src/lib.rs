//! Printed delivery note: template context and amount in words.

pub mod context;
pub mod words;

pub use context::{DeliveryNoteReport, ReportDelivery, ReportLine};
pub use words::{NumberToWords, SpanishWords};

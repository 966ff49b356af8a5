//! Delivery domain module: the delivery note aggregate.
//!
//! A delivery note records goods handed to (or returned by) a customer before
//! they are invoiced. Saving it ships the goods, consolidating it brings them
//! back into stock for invoicing.

pub mod line;
pub mod note;
pub mod number;
pub mod totals;

pub use line::{DeliveryLine, LineInput, LineProduct, LineType, MoveRouting};
pub use note::{
    AddLine, AnnulDelivery, ConsolidateDelivery, CreateDelivery, Delivery, DeliveryAnnulled,
    DeliveryCommand, DeliveryConsolidated, DeliveryCreated, DeliveryEvent, DeliveryId,
    DeliverySaved, DeliveryStatus, DeliveryUpdated, LineAdded, LineRemoved, LineUpdated,
    RemoveLine, SaveDelivery, UpdateDelivery, UpdateLine,
};
pub use number::format_number;
pub use totals::DeliveryTotals;

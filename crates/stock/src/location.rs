use serde::{Deserialize, Serialize};

use deliverynote_core::{DomainError, DomainResult, Entity};

deliverynote_core::domain_id!(
    /// Stock location identifier.
    LocationId
);

/// A warehouse and the child locations goods enter and leave through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: LocationId,
    pub name: String,
    pub input_location: LocationId,
    pub output_location: LocationId,
    pub storage_location: LocationId,
}

impl Warehouse {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("warehouse name cannot be empty"));
        }
        if self.input_location == self.output_location {
            return Err(DomainError::validation(
                "warehouse input and output locations must differ",
            ));
        }
        Ok(())
    }
}

impl Entity for Warehouse {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

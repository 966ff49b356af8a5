use serde::{Deserialize, Serialize};

use deliverynote_core::{DomainError, DomainResult, Entity};

deliverynote_core::domain_id!(
    /// Unit of measure identifier.
    UomId
);

deliverynote_core::domain_id!(
    /// Unit of measure category (units, weight, length...).
    UomCategoryId
);

/// Unit of measure. Quantities on a line must use a unit of the product's
/// category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uom {
    pub id: UomId,
    pub name: String,
    pub symbol: String,
    pub digits: u32,
    pub category: UomCategoryId,
}

impl Entity for Uom {
    type Id = UomId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Uom {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("uom name cannot be empty"));
        }
        if self.digits > 6 {
            return Err(DomainError::validation("uom digits must be at most 6"));
        }
        Ok(())
    }

    pub fn same_category(&self, other: &Uom) -> bool {
        self.category == other.category
    }
}

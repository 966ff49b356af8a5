use serde::{Deserialize, Serialize};

use deliverynote_core::{DomainError, DomainResult, Entity};
use deliverynote_stock::LocationId;
use deliverynote_taxes::{TaxId, TaxRule};

deliverynote_core::domain_id!(
    /// Party identifier.
    PartyId
);

/// A customer.
///
/// `customer_location` is where delivered goods end up; without it no stock
/// move can be generated for the party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub name: String,
    /// Language code documents for this party are printed in.
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub customer_location: Option<LocationId>,
    #[serde(default)]
    pub customer_tax_rule: Option<TaxRule>,
}

impl Entity for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Party {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("party name cannot be empty"));
        }
        if let Some(lang) = &self.lang {
            if lang.trim().is_empty() {
                return Err(DomainError::validation("party language cannot be blank"));
            }
        }
        Ok(())
    }

    /// Taxes a line should carry for a product sold to this party.
    pub fn customer_taxes(&self, product_taxes: &[TaxId]) -> Vec<TaxId> {
        match &self.customer_tax_rule {
            Some(rule) => rule.map_taxes(product_taxes),
            None => product_taxes.to_vec(),
        }
    }
}

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use deliverynote_core::{DomainError, DomainResult, Entity};
use deliverynote_taxes::TaxId;

use crate::uom::Uom;

deliverynote_core::domain_id!(
    /// Product identifier.
    ProductId
);

/// Physical goods generate stock moves; services never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Goods,
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    pub kind: ProductKind,
    pub sale_uom: Uom,
    pub list_price: Decimal,
    #[serde(default)]
    pub customer_taxes: Vec<TaxId>,
    /// Days between the delivery date and the planned shipping date.
    #[serde(default)]
    pub delivery_lead_days: u32,
    #[serde(default = "default_salable")]
    pub salable: bool,
}

fn default_salable() -> bool {
    true
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Product {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if self.list_price.is_sign_negative() {
            return Err(DomainError::validation("list price cannot be negative"));
        }
        self.sale_uom.validate()
    }

    pub fn is_service(&self) -> bool {
        self.kind == ProductKind::Service
    }

    /// Display name: `[code] name`, or just the name when there is no code.
    pub fn rec_name(&self) -> String {
        match self.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => format!("[{code}] {}", self.name),
            _ => self.name.clone(),
        }
    }

    /// Planned shipping date for goods delivered on `date` (or `today`).
    pub fn compute_delivery_date(&self, date: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
        let base = date.unwrap_or(today);
        base.checked_add_days(Days::new(u64::from(self.delivery_lead_days)))
            .unwrap_or(base)
    }

    /// Unit sale price, quantized to 4 decimals.
    pub fn sale_price(&self) -> Decimal {
        self.list_price.round_dp(4)
    }
}

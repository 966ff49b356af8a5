use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use deliverynote_core::{Currency, DomainError, DomainResult};
use deliverynote_products::{Product, ProductId, ProductKind, Uom, UomCategoryId};
use deliverynote_stock::{LocationId, LotId, Warehouse};
use deliverynote_taxes::Tax;

/// Digits a line unit price is quantized to.
pub const UNIT_PRICE_DIGITS: u32 = 4;

/// Largest absolute quantity a line accepts.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000_000;

/// Largest absolute unit price a line accepts.
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000_000;

/// Most taxes a single line may carry.
pub const MAX_LINE_TAXES: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    #[default]
    Line,
}

/// The product fields a line depends on, frozen when the line is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineProduct {
    pub id: ProductId,
    pub kind: ProductKind,
    pub lead_days: u32,
    pub uom_category: UomCategoryId,
}

impl LineProduct {
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id,
            kind: product.kind,
            lead_days: product.delivery_lead_days,
            uom_category: product.sale_uom.category,
        }
    }

    pub fn is_service(&self) -> bool {
        self.kind == ProductKind::Service
    }
}

/// Line content as submitted by a caller (add or update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    #[serde(default)]
    pub line_type: LineType,
    pub product: Option<LineProduct>,
    pub quantity: Decimal,
    pub unit: Option<Uom>,
    pub unit_price: Decimal,
    pub lot_id: Option<LotId>,
    pub description: String,
    pub note: Option<String>,
    #[serde(default)]
    pub taxes: Vec<Tax>,
}

impl LineInput {
    /// Validate and normalize into a line numbered `line_no`.
    pub(crate) fn into_line(self, line_no: u32) -> DomainResult<DeliveryLine> {
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return Err(DomainError::validation("line description is required"));
        }

        if let (Some(product), Some(unit)) = (&self.product, &self.unit) {
            if product.uom_category != unit.category {
                return Err(DomainError::validation(format!(
                    "unit '{}' is not compatible with the product unit category",
                    unit.name
                )));
            }
        }

        if let Some(unit) = &self.unit {
            if self.quantity.round_dp(unit.digits) != self.quantity {
                return Err(DomainError::validation(format!(
                    "quantity {} has more than {} decimals for unit '{}'",
                    self.quantity, unit.digits, unit.name
                )));
            }
        }

        if self.quantity.abs() > Decimal::from(MAX_LINE_QUANTITY) {
            return Err(DomainError::validation(format!(
                "quantity {} is out of range",
                self.quantity
            )));
        }
        if self.unit_price.abs() > Decimal::from(MAX_UNIT_PRICE) {
            return Err(DomainError::validation(format!(
                "unit price {} is out of range",
                self.unit_price
            )));
        }
        if self.taxes.len() > MAX_LINE_TAXES {
            return Err(DomainError::validation(format!(
                "a line carries at most {MAX_LINE_TAXES} taxes"
            )));
        }
        for tax in &self.taxes {
            tax.validate()?;
        }

        if self.lot_id.is_some() && self.product.is_none() {
            return Err(DomainError::validation("a lot needs a product on the line"));
        }

        Ok(DeliveryLine {
            line_no,
            line_type: self.line_type,
            product: self.product,
            quantity: self.quantity,
            unit: self.unit,
            unit_price: self.unit_price.round_dp(UNIT_PRICE_DIGITS),
            lot_id: self.lot_id,
            description,
            note: self.note.filter(|n| !n.trim().is_empty()),
            taxes: self.taxes,
        })
    }
}

/// A line of a delivery note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLine {
    pub line_no: u32,
    pub line_type: LineType,
    pub product: Option<LineProduct>,
    pub quantity: Decimal,
    pub unit: Option<Uom>,
    pub unit_price: Decimal,
    pub lot_id: Option<LotId>,
    pub description: String,
    pub note: Option<String>,
    /// Taxes linked to the line.
    pub taxes: Vec<Tax>,
}

impl DeliveryLine {
    /// `quantity × unit_price` rounded to the currency.
    pub fn amount(&self, currency: &Currency) -> Decimal {
        match self.line_type {
            LineType::Line => currency.round(self.quantity * self.unit_price),
        }
    }

    /// Source and destination of the goods on this line.
    ///
    /// Positive quantities leave through the warehouse output location;
    /// negative ones come back through its input location.
    pub fn locations(
        &self,
        warehouse: &Warehouse,
        customer_location: LocationId,
    ) -> (LocationId, LocationId) {
        if self.quantity >= Decimal::ZERO {
            (warehouse.output_location, customer_location)
        } else {
            (customer_location, warehouse.input_location)
        }
    }

    pub fn planned_date(
        &self,
        delivery_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Option<NaiveDate> {
        let product = self.product.as_ref()?;
        if self.quantity <= Decimal::ZERO {
            return None;
        }
        let base = delivery_date.unwrap_or(today);
        base.checked_add_days(chrono::Days::new(u64::from(product.lead_days)))
    }

    /// Whether the line moves physical goods.
    pub fn moves_goods(&self) -> bool {
        matches!(&self.product, Some(p) if !p.is_service()) && !self.quantity.is_zero()
    }
}

/// Where moves for a delivery go: the warehouse and the party's customer
/// location, resolved from the catalog when the action runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRouting {
    pub warehouse: Warehouse,
    pub customer_location: Option<LocationId>,
}

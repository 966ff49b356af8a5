//! Reference data the delivery service reads: units, taxes, products,
//! customers and warehouses.
//!
//! Records are tenant-scoped and replaced wholesale on upsert. Deliveries keep
//! their own snapshot of what they use, so later edits here do not rewrite
//! existing lines.

use std::sync::Arc;

use deliverynote_core::{DomainError, DomainResult, TenantId};
use deliverynote_parties::{Party, PartyId};
use deliverynote_products::{Product, ProductId, Uom, UomId};
use deliverynote_stock::{LocationId, Warehouse};
use deliverynote_taxes::{Tax, TaxId};

use crate::read_model::{InMemoryTenantStore, TenantStore};

pub trait Catalog: Send + Sync {
    fn upsert_uom(&self, tenant_id: TenantId, uom: Uom) -> DomainResult<()>;
    fn uom(&self, tenant_id: TenantId, id: UomId) -> Option<Uom>;

    fn upsert_tax(&self, tenant_id: TenantId, tax: Tax) -> DomainResult<()>;
    fn tax(&self, tenant_id: TenantId, id: TaxId) -> Option<Tax>;

    fn upsert_product(&self, tenant_id: TenantId, product: Product) -> DomainResult<()>;
    fn product(&self, tenant_id: TenantId, id: ProductId) -> Option<Product>;

    fn upsert_party(&self, tenant_id: TenantId, party: Party) -> DomainResult<()>;
    fn party(&self, tenant_id: TenantId, id: PartyId) -> Option<Party>;

    fn upsert_warehouse(&self, tenant_id: TenantId, warehouse: Warehouse) -> DomainResult<()>;
    fn warehouse(&self, tenant_id: TenantId, id: LocationId) -> Option<Warehouse>;

    /// Resolve tax ids, failing on the first unknown one.
    fn taxes(&self, tenant_id: TenantId, ids: &[TaxId]) -> DomainResult<Vec<Tax>> {
        ids.iter()
            .map(|id| {
                self.tax(tenant_id, *id)
                    .ok_or_else(|| DomainError::validation(format!("unknown tax {id}")))
            })
            .collect()
    }
}

impl<C> Catalog for Arc<C>
where
    C: Catalog + ?Sized,
{
    fn upsert_uom(&self, tenant_id: TenantId, uom: Uom) -> DomainResult<()> {
        (**self).upsert_uom(tenant_id, uom)
    }
    fn uom(&self, tenant_id: TenantId, id: UomId) -> Option<Uom> {
        (**self).uom(tenant_id, id)
    }
    fn upsert_tax(&self, tenant_id: TenantId, tax: Tax) -> DomainResult<()> {
        (**self).upsert_tax(tenant_id, tax)
    }
    fn tax(&self, tenant_id: TenantId, id: TaxId) -> Option<Tax> {
        (**self).tax(tenant_id, id)
    }
    fn upsert_product(&self, tenant_id: TenantId, product: Product) -> DomainResult<()> {
        (**self).upsert_product(tenant_id, product)
    }
    fn product(&self, tenant_id: TenantId, id: ProductId) -> Option<Product> {
        (**self).product(tenant_id, id)
    }
    fn upsert_party(&self, tenant_id: TenantId, party: Party) -> DomainResult<()> {
        (**self).upsert_party(tenant_id, party)
    }
    fn party(&self, tenant_id: TenantId, id: PartyId) -> Option<Party> {
        (**self).party(tenant_id, id)
    }
    fn upsert_warehouse(&self, tenant_id: TenantId, warehouse: Warehouse) -> DomainResult<()> {
        (**self).upsert_warehouse(tenant_id, warehouse)
    }
    fn warehouse(&self, tenant_id: TenantId, id: LocationId) -> Option<Warehouse> {
        (**self).warehouse(tenant_id, id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    uoms: InMemoryTenantStore<UomId, Uom>,
    taxes: InMemoryTenantStore<TaxId, Tax>,
    products: InMemoryTenantStore<ProductId, Product>,
    parties: InMemoryTenantStore<PartyId, Party>,
    warehouses: InMemoryTenantStore<LocationId, Warehouse>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Catalog for InMemoryCatalog {
    fn upsert_uom(&self, tenant_id: TenantId, uom: Uom) -> DomainResult<()> {
        uom.validate()?;
        self.uoms.upsert(tenant_id, uom.id, uom);
        Ok(())
    }

    fn uom(&self, tenant_id: TenantId, id: UomId) -> Option<Uom> {
        self.uoms.get(tenant_id, &id)
    }

    fn upsert_tax(&self, tenant_id: TenantId, tax: Tax) -> DomainResult<()> {
        tax.validate()?;
        self.taxes.upsert(tenant_id, tax.id, tax);
        Ok(())
    }

    fn tax(&self, tenant_id: TenantId, id: TaxId) -> Option<Tax> {
        self.taxes.get(tenant_id, &id)
    }

    fn upsert_product(&self, tenant_id: TenantId, product: Product) -> DomainResult<()> {
        product.validate()?;
        self.taxes(tenant_id, &product.customer_taxes)?;
        self.products.upsert(tenant_id, product.id, product);
        Ok(())
    }

    fn product(&self, tenant_id: TenantId, id: ProductId) -> Option<Product> {
        self.products.get(tenant_id, &id)
    }

    fn upsert_party(&self, tenant_id: TenantId, party: Party) -> DomainResult<()> {
        party.validate()?;
        self.parties.upsert(tenant_id, party.id, party);
        Ok(())
    }

    fn party(&self, tenant_id: TenantId, id: PartyId) -> Option<Party> {
        self.parties.get(tenant_id, &id)
    }

    fn upsert_warehouse(&self, tenant_id: TenantId, warehouse: Warehouse) -> DomainResult<()> {
        warehouse.validate()?;
        self.warehouses.upsert(tenant_id, warehouse.id, warehouse);
        Ok(())
    }

    fn warehouse(&self, tenant_id: TenantId, id: LocationId) -> Option<Warehouse> {
        self.warehouses.get(tenant_id, &id)
    }
}

//! Reference data upserts. Records are replaced wholesale by id.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::Serialize;

use deliverynote_core::{DomainResult, TenantId};
use deliverynote_infra::catalog::Catalog;
use deliverynote_parties::Party;
use deliverynote_products::{Product, Uom};
use deliverynote_stock::Warehouse;
use deliverynote_taxes::Tax;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/uoms", post(upsert_uom))
        .route("/taxes", post(upsert_tax))
        .route("/products", post(upsert_product))
        .route("/parties", post(upsert_party))
        .route("/warehouses", post(upsert_warehouse))
}

fn respond<T: Serialize>(
    result: DomainResult<()>,
    tenant_id: TenantId,
    kind: &'static str,
    record: T,
) -> axum::response::Response {
    match result {
        Ok(()) => {
            tracing::debug!(%tenant_id, kind, "catalog record stored");
            (StatusCode::CREATED, Json(record)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn upsert_uom(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<Uom>,
) -> axum::response::Response {
    let result = services.delivery.catalog().upsert_uom(tenant.tenant_id(), body.clone());
    respond(result, tenant.tenant_id(), "uom", body)
}

pub async fn upsert_tax(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<Tax>,
) -> axum::response::Response {
    let result = services.delivery.catalog().upsert_tax(tenant.tenant_id(), body.clone());
    respond(result, tenant.tenant_id(), "tax", body)
}

pub async fn upsert_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<Product>,
) -> axum::response::Response {
    let result = services.delivery.catalog().upsert_product(tenant.tenant_id(), body.clone());
    respond(result, tenant.tenant_id(), "product", body)
}

pub async fn upsert_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<Party>,
) -> axum::response::Response {
    let result = services.delivery.catalog().upsert_party(tenant.tenant_id(), body.clone());
    respond(result, tenant.tenant_id(), "party", body)
}

pub async fn upsert_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<Warehouse>,
) -> axum::response::Response {
    let result = services
        .delivery
        .catalog()
        .upsert_warehouse(tenant.tenant_id(), body.clone());
    respond(result, tenant.tenant_id(), "warehouse", body)
}

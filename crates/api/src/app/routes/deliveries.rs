use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::Utc;

use deliverynote_delivery::{Delivery, DeliveryId};
use deliverynote_infra::service::{LineRequest, ServiceResult};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_delivery).get(list_deliveries))
        .route("/:id", get(get_delivery).patch(update_delivery))
        .route("/:id/lines", post(add_line))
        .route("/:id/lines/:line_no", patch(update_line).delete(remove_line))
        .route("/:id/save", post(save_delivery))
        .route("/:id/consolidate", post(consolidate_delivery))
        .route("/:id/annul", post(annul_delivery))
        .route("/:id/totals", get(get_totals))
        .route("/:id/report", get(get_report))
}

fn delivery_response(
    services: &AppServices,
    status: StatusCode,
    result: ServiceResult<Delivery>,
) -> axum::response::Response {
    match result {
        Ok(delivery) => {
            let rounding = services.delivery.config().tax_rounding;
            (status, Json(dto::delivery_to_json(&delivery, rounding))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

fn delivery_id(raw: &str) -> Result<DeliveryId, axum::response::Response> {
    dto::parse_id(raw)
}

pub async fn create_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::DeliveryRequest>,
) -> axum::response::Response {
    let header = match body.into_header() {
        Ok(h) => h,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let result = services.delivery.create(tenant.tenant_id(), header);
    delivery_response(&services, StatusCode::CREATED, result)
}

pub async fn list_deliveries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let items = services.deliveries_list(tenant.tenant_id());
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match delivery_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services.delivery.get(tenant.tenant_id(), id);
    delivery_response(&services, StatusCode::OK, result)
}

pub async fn update_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DeliveryRequest>,
) -> axum::response::Response {
    let id = match delivery_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let header = match body.into_header() {
        Ok(h) => h,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let result = services.delivery.update(tenant.tenant_id(), id, header);
    delivery_response(&services, StatusCode::OK, result)
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<LineRequest>,
) -> axum::response::Response {
    let id = match delivery_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services.delivery.add_line(tenant.tenant_id(), id, body);
    delivery_response(&services, StatusCode::CREATED, result)
}

pub async fn update_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((id, line_no)): Path<(String, u32)>,
    Json(body): Json<LineRequest>,
) -> axum::response::Response {
    let id = match delivery_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services.delivery.update_line(tenant.tenant_id(), id, line_no, body);
    delivery_response(&services, StatusCode::OK, result)
}

pub async fn remove_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((id, line_no)): Path<(String, u32)>,
) -> axum::response::Response {
    let id = match delivery_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services.delivery.remove_line(tenant.tenant_id(), id, line_no);
    delivery_response(&services, StatusCode::OK, result)
}

pub async fn save_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match delivery_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let today = Utc::now().date_naive();
    let result = services.delivery.save(tenant.tenant_id(), id, today);
    delivery_response(&services, StatusCode::OK, result)
}

pub async fn consolidate_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match delivery_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let today = Utc::now().date_naive();
    match services.delivery.consolidate(tenant.tenant_id(), id, today) {
        Ok(consolidation) => {
            let rounding = services.delivery.config().tax_rounding;
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "delivery": dto::delivery_to_json(&consolidation.delivery, rounding),
                    "draft": consolidation.draft,
                })),
            )
                .into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn annul_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match delivery_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let today = Utc::now().date_naive();
    let result = services.delivery.annul(tenant.tenant_id(), id, today);
    delivery_response(&services, StatusCode::OK, result)
}

pub async fn get_totals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match delivery_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delivery.totals(tenant.tenant_id(), id) {
        Ok(totals) => (StatusCode::OK, Json(dto::totals_to_json(totals))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match delivery_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delivery.report(tenant.tenant_id(), id) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

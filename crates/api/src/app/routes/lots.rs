use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use deliverynote_stock::LotId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_lot))
        .route("/:id", get(get_lot))
}

pub async fn register_lot(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::RegisterLotRequest>,
) -> axum::response::Response {
    match services
        .delivery
        .register_lot(tenant.tenant_id(), body.product_id, body.number)
    {
        Ok(lot) => (StatusCode::CREATED, Json(dto::lot_to_json(&lot))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_lot(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let lot_id: LotId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delivery.lot(tenant.tenant_id(), lot_id) {
        Ok(lot) => (StatusCode::OK, Json(dto::lot_to_json(&lot))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

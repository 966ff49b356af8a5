use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::services::AppServices;
use crate::context::TenantContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn stock_levels(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let items = services.stock_levels(tenant.tenant_id());
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

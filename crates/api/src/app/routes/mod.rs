use axum::{Router, routing::get};

pub mod catalog;
pub mod deliveries;
pub mod lots;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/catalog", catalog::router())
        .nest("/lots", lots::router())
        .nest("/deliveries", deliveries::router())
        .route("/stock/levels", get(system::stock_levels))
}

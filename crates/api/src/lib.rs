//! HTTP API for delivery notes: router, tenant context and JSON mapping.

pub mod app;
pub mod context;
pub mod middleware;

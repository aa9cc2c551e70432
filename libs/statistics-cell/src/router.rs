use std::sync::Arc;

use axum::{
    Router,
    routing::get,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn statistics_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/logs", get(handlers::list_logs))
        .route("/appointments", get(handlers::appointment_statistics))
        .route("/export/logs.csv", get(handlers::export_logs))
        .route("/export/appointments.csv", get(handlers::export_appointments))
        .route("/export/statistics.csv", get(handlers::export_statistics))
        .route("/export/statistics.pdf", get(handlers::export_statistics_pdf))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

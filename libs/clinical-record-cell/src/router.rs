use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn clinical_record_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::all_records))
        .route("/appointments/{appointment_id}", post(handlers::create_record))
        .route("/patients/{patient_id}", get(handlers::records_for_patient))
        .route("/patients/{patient_id}/pdf", get(handlers::export_patient_pdf))
        .route(
            "/patients/{patient_id}/specialists/{specialist_id}",
            get(handlers::records_for_patient_by_specialist),
        )
        .route("/specialists/{specialist_id}", get(handlers::records_for_specialist))
        .route("/specialists/{specialist_id}/patients", get(handlers::patients_attended))
        .route("/{record_id}", put(handlers::update_record).delete(handlers::delete_record))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

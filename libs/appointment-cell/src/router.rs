use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::request_appointment).get(handlers::list_appointments))
        .route("/mine", get(handlers::my_appointments))
        .route("/dashboard/specialist", get(handlers::specialist_dashboard))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/actions", get(handlers::appointment_actions))
        .route("/{appointment_id}/accept", post(handlers::accept_appointment))
        .route("/{appointment_id}/reject", post(handlers::reject_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/rate", post(handlers::rate_appointment))
        .route("/{appointment_id}/survey", post(handlers::survey_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn profile_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/by-emails", post(handlers::profiles_by_emails));

    let protected_routes = Router::new()
        .route("/", get(handlers::list_users))
        .route("/patients", get(handlers::list_patients))
        .route("/specialists", get(handlers::list_specialists))
        .route("/specialists/pending", get(handlers::list_pending_specialists))
        .route("/specialties", get(handlers::distinct_specialties))
        .route("/{user_id}", get(handlers::get_profile).put(handlers::update_profile))
        .route("/{user_id}/approve", post(handlers::approve_specialist))
        .route("/{user_id}/reject", post(handlers::reject_specialist))
        .route("/{user_id}/revoke", post(handlers::revoke_specialist))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

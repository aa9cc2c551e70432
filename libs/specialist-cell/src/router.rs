use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, delete},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn specialist_routes(state: Arc<AppConfig>) -> Router {
    // Registration needs the specialty catalogue before anyone is logged in
    let public_routes = Router::new()
        .route("/specialties", get(handlers::list_specialties))
        .route("/specialties/{name}/exists", get(handlers::specialty_exists));

    let protected_routes = Router::new()
        .route("/specialties", post(handlers::add_specialty))
        .route("/{specialist_id}/availability", get(handlers::list_availability).post(handlers::add_availability))
        .route("/{specialist_id}/availability/{availability_id}", delete(handlers::delete_availability))
        .route("/{specialist_id}/available-days", get(handlers::available_days))
        .route("/{specialist_id}/available-slots", get(handlers::available_slots))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

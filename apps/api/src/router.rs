use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use clinical_record_cell::router::clinical_record_routes;
use profile_cell::router::profile_routes;
use shared_config::AppConfig;
use specialist_cell::router::specialist_routes;
use statistics_cell::router::statistics_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic Portal API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/profiles", profile_routes(state.clone()))
        .nest("/specialists", specialist_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/clinical-records", clinical_record_routes(state.clone()))
        .nest("/statistics", statistics_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(Arc::new(AppConfig {
            supabase_jwt_secret: "test-secret".to_string(),
            ..AppConfig::default()
        }))
    }

    #[tokio::test]
    async fn liveness_answers_without_auth() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        for uri in ["/appointments/mine", "/clinical-records", "/statistics/logs", "/auth/me"] {
            let response = app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }
}

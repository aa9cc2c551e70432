use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use profile_cell::ProfileService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::role::Role;
use shared_utils::permissions::require_role;

use crate::models::DateRangeQuery;
use crate::services::StatisticsService;

async fn require_admin(state: &AppConfig, user: &User, token: &str) -> Result<(), AppError> {
    let role = ProfileService::new(state).caller_role(&user.id, token).await?;
    require_role(role, &[Role::Administrator])
}

fn attachment(content_type: &str, filename: &str, bytes: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        bytes,
    )
}

fn csv_attachment(filename: &str, bytes: Vec<u8>) -> impl IntoResponse {
    attachment("text/csv; charset=utf-8", filename, bytes)
}

#[axum::debug_handler]
pub async fn list_logs(
    State(state): State<Arc<AppConfig>>,
    Query(range): Query<DateRangeQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    require_admin(&state, &user, token).await?;

    let logs = StatisticsService::new(&state).list_logs(&range, token).await?;
    Ok(Json(json!({
        "logs": logs,
        "total": logs.len()
    })))
}

#[axum::debug_handler]
pub async fn appointment_statistics(
    State(state): State<Arc<AppConfig>>,
    Query(range): Query<DateRangeQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    require_admin(&state, &user, token).await?;

    let stats = StatisticsService::new(&state).appointment_statistics(&range, token).await?;
    Ok(Json(json!(stats)))
}

#[axum::debug_handler]
pub async fn export_logs(
    State(state): State<Arc<AppConfig>>,
    Query(range): Query<DateRangeQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let token = auth.token();
    require_admin(&state, &user, token).await?;

    let bytes = StatisticsService::new(&state).export_logs(&range, token).await?;
    Ok(csv_attachment("logs-ingresos.csv", bytes))
}

#[axum::debug_handler]
pub async fn export_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(range): Query<DateRangeQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let token = auth.token();
    require_admin(&state, &user, token).await?;

    let bytes = StatisticsService::new(&state).export_appointments(&range, token).await?;
    Ok(csv_attachment("turnos.csv", bytes))
}

#[axum::debug_handler]
pub async fn export_statistics(
    State(state): State<Arc<AppConfig>>,
    Query(range): Query<DateRangeQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let token = auth.token();
    require_admin(&state, &user, token).await?;

    let bytes = StatisticsService::new(&state).export_statistics(&range, token).await?;
    Ok(csv_attachment("estadisticas.csv", bytes))
}

#[axum::debug_handler]
pub async fn export_statistics_pdf(
    State(state): State<Arc<AppConfig>>,
    Query(range): Query<DateRangeQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let token = auth.token();
    require_admin(&state, &user, token).await?;

    let bytes = StatisticsService::new(&state).export_statistics_pdf(&range, token).await?;
    Ok(attachment("application/pdf", "estadisticas.pdf", bytes))
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use profile_cell::ProfileService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::role::Role;
use shared_utils::permissions::require_role;

use crate::models::{
    Appointment, CommentRequest, CompleteRequest, RateRequest, RequestAppointment, SearchQuery,
    StatusChange, SurveyRequest, Viewer,
};
use crate::services::{search, AppointmentBookingService};

async fn viewer_for(state: &AppConfig, user: &User, token: &str) -> Result<Viewer, AppError> {
    let role = ProfileService::new(state).caller_role(&user.id, token).await?;
    Ok(Viewer::new(user.id.clone(), role))
}

fn appointment_json(service: &AppointmentBookingService, appointment: &Appointment, viewer: &Viewer) -> Value {
    json!({
        "appointment": appointment,
        "acciones": service.lifecycle().available_actions(appointment, viewer),
    })
}

// ==============================================================================
// BOOKING AND LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn request_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RequestAppointment>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service.request_appointment(&viewer, request, token).await?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Turno solicitado correctamente"
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;
    require_role(viewer.role, &[Role::Administrator])?;

    let service = AppointmentBookingService::new(&state);
    let appointments = search::search(service.list_all(token).await?, &query, viewer.role);

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;
    debug!("Listing appointments for {} ({})", viewer.user_id, viewer.role);

    let service = AppointmentBookingService::new(&state);
    let appointments = search::search(service.list_for_viewer(&viewer, token).await?, &query, viewer.role);

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service.get_for_viewer(&appointment_id, &viewer, token).await?;

    Ok(Json(appointment_json(&service, &appointment, &viewer)))
}

#[axum::debug_handler]
pub async fn appointment_actions(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service.get_for_viewer(&appointment_id, &viewer, token).await?;

    Ok(Json(json!({
        "appointment_id": appointment.id,
        "estado": appointment.estado,
        "acciones": service.lifecycle().available_actions(&appointment, &viewer),
    })))
}

#[axum::debug_handler]
pub async fn specialist_dashboard(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;
    require_role(viewer.role, &[Role::Specialist])?;

    let service = AppointmentBookingService::new(&state);
    let dashboard = service.specialist_dashboard(&viewer.user_id, token).await?;

    Ok(Json(json!(dashboard)))
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

async fn change_status(
    state: &AppConfig,
    appointment_id: &str,
    token: &str,
    user: &User,
    change: StatusChange,
) -> Result<Json<Value>, AppError> {
    let viewer = viewer_for(state, user, token).await?;

    let service = AppointmentBookingService::new(state);
    let appointment = service.change_status(appointment_id, &viewer, change, token).await?;

    Ok(Json(appointment_json(&service, &appointment, &viewer)))
}

#[axum::debug_handler]
pub async fn accept_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    change_status(&state, &appointment_id, auth.token(), &user, StatusChange::Accept).await
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<Value>, AppError> {
    let change = StatusChange::Reject { comentario: request.comentario };
    change_status(&state, &appointment_id, auth.token(), &user, change).await
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<Value>, AppError> {
    let change = StatusChange::Cancel { comentario: request.comentario };
    change_status(&state, &appointment_id, auth.token(), &user, change).await
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<Value>, AppError> {
    let change = StatusChange::Complete { resena: request.resena };
    change_status(&state, &appointment_id, auth.token(), &user, change).await
}

#[axum::debug_handler]
pub async fn rate_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RateRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service.rate(&appointment_id, &viewer, request, token).await?;

    Ok(Json(appointment_json(&service, &appointment, &viewer)))
}

#[axum::debug_handler]
pub async fn survey_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SurveyRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service.complete_survey(&appointment_id, &viewer, request, token).await?;

    Ok(Json(appointment_json(&service, &appointment, &viewer)))
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
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
use shared_utils::permissions::{require_owner_or_role, require_role};

use crate::models::{
    AvailableDaysQuery, AvailableSlotsQuery, CreateAvailabilityRequest, CreateSpecialtyRequest,
    SpecialtiesQuery,
};
use crate::services::{AvailabilityService, SpecialtyService};

// ==============================================================================
// SPECIALTIES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_specialties(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SpecialtiesQuery>,
) -> Result<Json<Value>, AppError> {
    let service = SpecialtyService::new(&state);

    if query.with_images.unwrap_or(false) {
        let specialties = service.list_with_images(None).await?;
        return Ok(Json(json!({
            "specialties": specialties,
            "total": specialties.len()
        })));
    }

    let specialties = service.list_active(None).await?;
    Ok(Json(json!({
        "specialties": specialties,
        "total": specialties.len()
    })))
}

#[axum::debug_handler]
pub async fn specialty_exists(
    State(state): State<Arc<AppConfig>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = SpecialtyService::new(&state);
    let exists = service.specialty_exists(&name, None).await?;

    Ok(Json(json!({ "exists": exists })))
}

#[axum::debug_handler]
pub async fn add_specialty(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSpecialtyRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let role = ProfileService::new(&state).caller_role(&user.id, token).await?;
    require_role(role, &[Role::Administrator, Role::Specialist])?;

    let specialty = SpecialtyService::new(&state).add_specialty(request, token).await?;
    Ok(Json(json!(specialty)))
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[axum::debug_handler]
pub async fn list_availability(
    State(state): State<Arc<AppConfig>>,
    Path(specialist_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let availability = service.list_for_specialist(&specialist_id, auth.token()).await?;

    Ok(Json(json!({
        "availability": availability,
        "specialist_id": specialist_id,
        "total": availability.len()
    })))
}

#[axum::debug_handler]
pub async fn add_availability(
    State(state): State<Arc<AppConfig>>,
    Path(specialist_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let role = ProfileService::new(&state).caller_role(&user.id, token).await?;
    require_owner_or_role(&user.id, &specialist_id, role, &[Role::Administrator])?;

    let service = AvailabilityService::new(&state);
    let created = service.add_availability(&specialist_id, request, token).await?;

    Ok(Json(json!(created)))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppConfig>>,
    Path((specialist_id, availability_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let role = ProfileService::new(&state).caller_role(&user.id, token).await?;
    require_owner_or_role(&user.id, &specialist_id, role, &[Role::Administrator])?;

    let service = AvailabilityService::new(&state);
    service.delete_availability(&specialist_id, &availability_id, token).await?;

    Ok(Json(json!({
        "deleted": true,
        "id": availability_id
    })))
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[axum::debug_handler]
pub async fn available_days(
    State(state): State<Arc<AppConfig>>,
    Path(specialist_id): Path<String>,
    Query(query): Query<AvailableDaysQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let days = service
        .available_days(&specialist_id, &query.specialty, auth.token())
        .await?;

    Ok(Json(json!({
        "days": days,
        "specialist_id": specialist_id,
        "specialty": query.specialty,
        "total": days.len()
    })))
}

#[axum::debug_handler]
pub async fn available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(specialist_id): Path<String>,
    Query(query): Query<AvailableSlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let slots = service
        .available_slots(&specialist_id, &query.specialty, query.date, auth.token())
        .await?;

    Ok(Json(json!({
        "available_slots": slots,
        "specialist_id": specialist_id,
        "date": query.date,
        "total_slots": slots.len()
    })))
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::role::Role;
use shared_utils::permissions::{require_owner_or_role, require_role};

use crate::models::{
    specialist_status, ListSpecialistsQuery, ListUsersQuery, Profile, ProfilesByEmailsRequest,
    UpdateProfileRequest,
};
use crate::services::ProfileService;

fn profile_json(profile: &Profile) -> Value {
    let mut body = json!(profile);
    body["especialidades"] = json!(profile.specialties());
    if profile.is_specialist() {
        body["estado_aprobacion"] = json!(specialist_status(profile));
    }
    body
}

fn profiles_json(profiles: &[Profile]) -> Value {
    let items: Vec<Value> = profiles.iter().map(profile_json).collect();
    json!({
        "profiles": items,
        "total": profiles.len()
    })
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn profiles_by_emails(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<ProfilesByEmailsRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ProfileService::new(&state);
    let profiles = service.profiles_by_emails(&request.emails, None).await?;

    Ok(Json(json!({
        "profiles": profiles,
        "total": profiles.len()
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ProfileService::new(&state);

    if user.id != user_id {
        let role = service.caller_role(&user.id, token).await?;
        require_owner_or_role(&user.id, &user_id, role, &[Role::Administrator])?;
    }

    let profile = service.get_profile(&user_id, token).await?;
    Ok(Json(profile_json(&profile)))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    if user.id != user_id {
        return Err(AppError::Forbidden("Solo puedes modificar tu propio perfil".to_string()));
    }

    let service = ProfileService::new(&state);
    let profile = service.update_profile(&user_id, request, auth.token()).await?;

    Ok(Json(profile_json(&profile)))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ListUsersQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ProfileService::new(&state);
    require_role(service.caller_role(&user.id, token).await?, &[Role::Administrator])?;

    let profiles = service.list_users(query.role, token).await?;
    Ok(Json(profiles_json(&profiles)))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ProfileService::new(&state);
    require_role(
        service.caller_role(&user.id, token).await?,
        &[Role::Administrator, Role::Specialist],
    )?;

    let profiles = service.list_patients(token).await?;
    Ok(Json(profiles_json(&profiles)))
}

#[axum::debug_handler]
pub async fn list_specialists(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ListSpecialistsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = ProfileService::new(&state);
    let profiles = service
        .list_specialists(query.specialty.as_deref(), auth.token())
        .await?;

    Ok(Json(profiles_json(&profiles)))
}

#[axum::debug_handler]
pub async fn list_pending_specialists(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ProfileService::new(&state);
    require_role(service.caller_role(&user.id, token).await?, &[Role::Administrator])?;

    let profiles = service.list_pending_specialists(token).await?;
    Ok(Json(profiles_json(&profiles)))
}

#[axum::debug_handler]
pub async fn distinct_specialties(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = ProfileService::new(&state);
    let specialties = service.distinct_specialties(auth.token()).await?;

    Ok(Json(json!({
        "specialties": specialties,
        "total": specialties.len()
    })))
}

async fn change_approval(
    state: &AppConfig,
    token: &str,
    caller: &User,
    target_id: &str,
    action: &str,
) -> Result<Json<Value>, AppError> {
    let service = ProfileService::new(state);
    require_role(service.caller_role(&caller.id, token).await?, &[Role::Administrator])?;

    let profile = match action {
        "approve" => service.approve_specialist(target_id, token).await?,
        "reject" => service.reject_specialist(target_id, token).await?,
        _ => service.revoke_specialist_approval(target_id, token).await?,
    };

    Ok(Json(profile_json(&profile)))
}

#[axum::debug_handler]
pub async fn approve_specialist(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    change_approval(&state, auth.token(), &user, &user_id, "approve").await
}

#[axum::debug_handler]
pub async fn reject_specialist(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    change_approval(&state, auth.token(), &user, &user_id, "reject").await
}

#[axum::debug_handler]
pub async fn revoke_specialist(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    change_approval(&state, auth.token(), &user, &user_id, "revoke").await
}

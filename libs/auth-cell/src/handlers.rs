use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State, Json},
    http::HeaderMap,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use profile_cell::ProfileService;
use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_models::role::Role;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt::validate_token as decode_token;
use shared_utils::permissions::require_role;
use shared_utils::validation::validate_national_id;

use crate::models::{
    LoginRequest, RegisterAdministratorRequest, RegisterPatientRequest, RegisterSpecialistRequest,
};
use crate::services::{RegistrationService, SessionService};

// ==============================================================================
// TOKENS
// ==============================================================================

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = bearer_token(&headers)?;
    let user = decode_token(token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = bearer_token(&headers)?;
    let valid = decode_token(token, &config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

// ==============================================================================
// REGISTRATION
// ==============================================================================

#[axum::debug_handler]
pub async fn register_patient(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<RegisterPatientRequest>,
) -> Result<Json<Value>, AppError> {
    let registration = RegistrationService::new(&state).register_patient(request).await?;
    Ok(Json(json!(registration)))
}

#[axum::debug_handler]
pub async fn register_specialist(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<RegisterSpecialistRequest>,
) -> Result<Json<Value>, AppError> {
    let registration = RegistrationService::new(&state).register_specialist(request).await?;
    Ok(Json(json!(registration)))
}

#[axum::debug_handler]
pub async fn register_administrator(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RegisterAdministratorRequest>,
) -> Result<Json<Value>, AppError> {
    let role = ProfileService::new(&state).caller_role(&user.id, auth.token()).await?;
    require_role(role, &[Role::Administrator])?;

    let registration = RegistrationService::new(&state).register_administrator(request).await?;
    Ok(Json(json!(registration)))
}

#[axum::debug_handler]
pub async fn check_national_id(
    State(state): State<Arc<AppConfig>>,
    Path(dni): Path<String>,
) -> Result<Json<Value>, AppError> {
    validate_national_id(&dni).map_err(AppError::ValidationError)?;

    let exists = RegistrationService::new(&state).national_id_exists(&dni).await?;
    Ok(Json(json!({
        "dni": dni,
        "exists": exists
    })))
}

// ==============================================================================
// SESSION
// ==============================================================================

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let session = SessionService::new(&state).login(request).await?;
    Ok(Json(json!(session)))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    SessionService::new(&state).logout(auth.token()).await?;
    debug!("User {} logged out", user.id);

    Ok(Json(json!({ "message": "Sesión cerrada" })))
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let details = SessionService::new(&state).me(&user.id, auth.token()).await?;
    Ok(Json(details))
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use appointment_cell::Viewer;
use profile_cell::ProfileService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::role::Role;
use shared_utils::permissions::{require_owner_or_role, require_role};

use crate::models::{CreateClinicalRecordRequest, UpdateClinicalRecordRequest};
use crate::services::ClinicalRecordService;

async fn viewer_for(state: &AppConfig, user: &User, token: &str) -> Result<Viewer, AppError> {
    let role = ProfileService::new(state).caller_role(&user.id, token).await?;
    Ok(Viewer::new(user.id.clone(), role))
}

#[axum::debug_handler]
pub async fn create_record(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateClinicalRecordRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;
    require_role(viewer.role, &[Role::Specialist])?;

    let service = ClinicalRecordService::new(&state);
    let record = service.create_record(&appointment_id, &viewer, request, token).await?;

    Ok(Json(json!({
        "historia": record,
        "message": "Historia clínica registrada y turno finalizado"
    })))
}

#[axum::debug_handler]
pub async fn all_records(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;
    require_role(viewer.role, &[Role::Administrator])?;

    let records = ClinicalRecordService::new(&state).all_records(token).await?;
    Ok(Json(json!({
        "records": records,
        "total": records.len()
    })))
}

#[axum::debug_handler]
pub async fn records_for_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;

    let records = ClinicalRecordService::new(&state)
        .records_for_patient(&patient_id, &viewer, token)
        .await?;
    Ok(Json(json!({
        "records": records,
        "patient_id": patient_id,
        "total": records.len()
    })))
}

#[axum::debug_handler]
pub async fn export_patient_pdf(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;

    let bytes = ClinicalRecordService::new(&state)
        .export_patient_pdf(&patient_id, &viewer, token)
        .await?;

    let disposition = format!("attachment; filename=\"historia-clinica-{}.pdf\"", patient_id);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

#[axum::debug_handler]
pub async fn records_for_specialist(
    State(state): State<Arc<AppConfig>>,
    Path(specialist_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;
    require_owner_or_role(&user.id, &specialist_id, viewer.role, &[Role::Administrator])?;

    let records = ClinicalRecordService::new(&state)
        .records_for_specialist(&specialist_id, token)
        .await?;
    Ok(Json(json!({
        "records": records,
        "specialist_id": specialist_id,
        "total": records.len()
    })))
}

#[axum::debug_handler]
pub async fn patients_attended(
    State(state): State<Arc<AppConfig>>,
    Path(specialist_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;
    require_owner_or_role(&user.id, &specialist_id, viewer.role, &[Role::Administrator])?;

    let attended = ClinicalRecordService::new(&state)
        .patients_attended(&specialist_id, token)
        .await?;
    Ok(Json(json!(attended)))
}

#[axum::debug_handler]
pub async fn records_for_patient_by_specialist(
    State(state): State<Arc<AppConfig>>,
    Path((patient_id, specialist_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;
    if user.id != patient_id {
        require_owner_or_role(&user.id, &specialist_id, viewer.role, &[Role::Administrator])?;
    }

    let records = ClinicalRecordService::new(&state)
        .records_for_patient_by_specialist(&patient_id, &specialist_id, token)
        .await?;
    Ok(Json(json!({
        "records": records,
        "total": records.len()
    })))
}

#[axum::debug_handler]
pub async fn update_record(
    State(state): State<Arc<AppConfig>>,
    Path(record_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateClinicalRecordRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;

    let record = ClinicalRecordService::new(&state)
        .update_record(&record_id, &viewer, request, token)
        .await?;
    Ok(Json(json!(record)))
}

#[axum::debug_handler]
pub async fn delete_record(
    State(state): State<Arc<AppConfig>>,
    Path(record_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let viewer = viewer_for(&state, &user, token).await?;
    require_role(viewer.role, &[Role::Administrator])?;

    ClinicalRecordService::new(&state).delete_record(&record_id, token).await?;
    Ok(Json(json!({
        "deleted": true,
        "id": record_id
    })))
}

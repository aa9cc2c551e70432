use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use appointment_cell::{id_as_string, AppointmentError, AppointmentStatus, DynamicField};
use profile_cell::{Profile, ProfileError};
use shared_models::error::AppError;
use shared_utils::format::parse_local_datetime;

pub const DEFAULT_REVIEW: &str = "Historia clínica registrada";

// ==============================================================================
// RECORD MODELS
// ==============================================================================

/// A row of `historias_clinicas`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalRecord {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub paciente_id: String,
    pub especialista_id: String,
    #[serde(deserialize_with = "id_as_string")]
    pub turno_id: String,
    pub fecha_atencion: String,
    #[serde(default)]
    pub altura: Option<f64>,
    #[serde(default)]
    pub peso: Option<f64>,
    #[serde(default)]
    pub temperatura: Option<f64>,
    #[serde(default)]
    pub presion: Option<String>,
    #[serde(default)]
    pub datos_dinamicos: Option<Vec<DynamicField>>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ClinicalRecord {
    pub fn attended_at(&self) -> Option<NaiveDateTime> {
        parse_local_datetime(&self.fecha_atencion)
    }

    pub fn fields(&self) -> &[DynamicField] {
        self.datos_dinamicos.as_deref().unwrap_or(&[])
    }
}

/// A record with the profiles of the people involved, where they could be loaded.
#[derive(Debug, Clone, Serialize)]
pub struct RecordEntry {
    pub historia: ClinicalRecord,
    pub paciente: Option<Profile>,
    pub especialista: Option<Profile>,
}

impl RecordEntry {
    pub fn bare(historia: ClinicalRecord) -> Self {
        Self { historia, paciente: None, especialista: None }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendedPatients {
    pub paciente_ids: Vec<String>,
    pub pacientes: Vec<Profile>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClinicalRecordRequest {
    pub altura: f64,
    pub peso: f64,
    pub temperatura: f64,
    pub presion: String,
    #[serde(default)]
    pub datos_dinamicos: Vec<DynamicField>,
    #[serde(default, alias = "reseña")]
    pub resena: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClinicalRecordRequest {
    pub altura: Option<f64>,
    pub peso: Option<f64>,
    pub temperatura: Option<f64>,
    pub presion: Option<String>,
    pub datos_dinamicos: Option<Vec<DynamicField>>,
}

impl UpdateClinicalRecordRequest {
    pub fn is_empty(&self) -> bool {
        self.altura.is_none()
            && self.peso.is_none()
            && self.temperatura.is_none()
            && self.presion.is_none()
            && self.datos_dinamicos.is_none()
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClinicalRecordError {
    #[error("Historia clínica no encontrada")]
    NotFound,

    #[error("Turno no encontrado")]
    AppointmentNotFound,

    #[error("Paciente no encontrado")]
    PatientNotFound,

    #[error("El turno ya tiene una historia clínica")]
    AlreadyExists,

    #[error("Solo se puede registrar la historia de un turno aceptado (estado actual: {0})")]
    AppointmentNotAccepted(AppointmentStatus),

    #[error("No tiene permiso para acceder a esta historia clínica")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("PDF error: {0}")]
    PdfError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),
}

impl From<ClinicalRecordError> for AppError {
    fn from(err: ClinicalRecordError) -> Self {
        match err {
            ClinicalRecordError::NotFound
            | ClinicalRecordError::AppointmentNotFound
            | ClinicalRecordError::PatientNotFound => {
                AppError::NotFound(err.to_string())
            }
            ClinicalRecordError::AlreadyExists | ClinicalRecordError::AppointmentNotAccepted(_) => {
                AppError::Conflict(err.to_string())
            }
            ClinicalRecordError::Unauthorized => AppError::Forbidden(err.to_string()),
            ClinicalRecordError::Forbidden(msg) => AppError::Forbidden(msg),
            ClinicalRecordError::ValidationError(msg) => AppError::ValidationError(msg),
            ClinicalRecordError::PdfError(msg) => AppError::Internal(msg),
            ClinicalRecordError::DatabaseError(msg) => AppError::Database(msg),
            ClinicalRecordError::Appointment(inner) => inner.into(),
        }
    }
}

impl From<ProfileError> for ClinicalRecordError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound => ClinicalRecordError::PatientNotFound,
            ProfileError::NotASpecialist => ClinicalRecordError::ValidationError(err.to_string()),
            ProfileError::Forbidden(msg) => ClinicalRecordError::Forbidden(msg),
            ProfileError::ValidationError(msg) => ClinicalRecordError::ValidationError(msg),
            ProfileError::DatabaseError(msg) => ClinicalRecordError::DatabaseError(msg),
        }
    }
}

/// Turns a stored row into a record, reporting malformed rows as database errors.
pub fn record_from_row(row: Value) -> Result<ClinicalRecord, ClinicalRecordError> {
    serde_json::from_value(row).map_err(|e| ClinicalRecordError::DatabaseError(format!("Invalid record row: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_accepts_numeric_ids_and_missing_fields() {
        let record = record_from_row(json!({
            "id": 7,
            "paciente_id": "p1",
            "especialista_id": "s1",
            "turno_id": 12,
            "fecha_atencion": "2024-01-15T10:00:00",
            "datos_dinamicos": null
        }))
        .unwrap();

        assert_eq!(record.id, "7");
        assert_eq!(record.turno_id, "12");
        assert!(record.fields().is_empty());
        assert!(record.attended_at().is_some());
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(UpdateClinicalRecordRequest::default().is_empty());
        let update = UpdateClinicalRecordRequest { peso: Some(70.0), ..Default::default() };
        assert!(!update.is_empty());
    }
}

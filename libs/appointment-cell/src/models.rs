use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use shared_models::error::AppError;
use shared_models::role::Role;
use shared_utils::format::parse_local_datetime;

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

/// Row ids may come back as text (uuid) or as numbers.
pub fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {}", other))),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "aceptado", alias = "confirmado")]
    Accepted,
    #[serde(rename = "realizado")]
    Completed,
    #[serde(rename = "cancelado")]
    Cancelled,
    #[serde(rename = "rechazado")]
    Rejected,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pendiente",
            AppointmentStatus::Accepted => "aceptado",
            AppointmentStatus::Completed => "realizado",
            AppointmentStatus::Cancelled => "cancelado",
            AppointmentStatus::Rejected => "rechazado",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Rejected
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttentionRating {
    pub puntaje: i32,
    pub comentario: String,
}

/// A row of `turnos`. `fecha` is local wall-clock time without offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub pacienteid: String,
    #[serde(default)]
    pub pacientenombre: Option<String>,
    pub especialistaid: String,
    #[serde(default)]
    pub especialistanombre: Option<String>,
    #[serde(default)]
    pub especialidad: Option<String>,
    pub fecha: String,
    pub estado: AppointmentStatus,
    #[serde(default)]
    pub comentariopaciente: Option<String>,
    #[serde(default)]
    pub comentarioespecialista: Option<String>,
    #[serde(default)]
    pub resena: Option<String>,
    #[serde(default)]
    pub encuestacompletada: Option<bool>,
    #[serde(default)]
    pub encuestacomentario: Option<String>,
    #[serde(default)]
    pub encuestaestrellas: Option<i32>,
    #[serde(default)]
    pub calificacionatencion: Option<AttentionRating>,
}

impl Appointment {
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        parse_local_datetime(&self.fecha)
    }

    pub fn has_review(&self) -> bool {
        self.resena.as_deref().map(|r| !r.trim().is_empty()).unwrap_or(false)
    }

    pub fn survey_completed(&self) -> bool {
        self.encuestacompletada.unwrap_or(false)
    }

    pub fn is_rated(&self) -> bool {
        self.calificacionatencion.is_some()
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.pacienteid == user_id || self.especialistaid == user_id
    }
}

/// One free-form entry of a clinical record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicField {
    pub clave: String,
    pub valor: String,
}

/// The clinical record attached to an appointment, as far as listings need it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(deserialize_with = "id_as_string")]
    pub turno_id: String,
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
}

impl LinkedRecord {
    pub fn fields(&self) -> &[DynamicField] {
        self.datos_dinamicos.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentWithRecord {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub historia_clinica: Option<LinkedRecord>,
}

// ==============================================================================
// ACTIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentAction {
    Accept,
    Reject,
    Cancel,
    Complete,
    Rate,
    Survey,
    ViewReview,
}

/// Who is looking at or acting on an appointment.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: String,
    pub role: Role,
}

impl Viewer {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self { user_id: user_id.into(), role }
    }

    pub fn is_patient_of(&self, appointment: &Appointment) -> bool {
        self.role == Role::Patient && appointment.pacienteid == self.user_id
    }

    pub fn is_specialist_of(&self, appointment: &Appointment) -> bool {
        self.role == Role::Specialist && appointment.especialistaid == self.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }

    pub fn can_view(&self, appointment: &Appointment) -> bool {
        self.is_admin() || self.is_patient_of(appointment) || self.is_specialist_of(appointment)
    }
}

/// A state-changing action with the text it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Accept,
    Reject { comentario: String },
    Cancel { comentario: String },
    Complete { resena: String },
}

impl StatusChange {
    pub fn action(&self) -> AppointmentAction {
        match self {
            StatusChange::Accept => AppointmentAction::Accept,
            StatusChange::Reject { .. } => AppointmentAction::Reject,
            StatusChange::Cancel { .. } => AppointmentAction::Cancel,
            StatusChange::Complete { .. } => AppointmentAction::Complete,
        }
    }

    pub fn target(&self) -> AppointmentStatus {
        match self {
            StatusChange::Accept => AppointmentStatus::Accepted,
            StatusChange::Reject { .. } => AppointmentStatus::Rejected,
            StatusChange::Cancel { .. } => AppointmentStatus::Cancelled,
            StatusChange::Complete { .. } => AppointmentStatus::Completed,
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RequestAppointment {
    #[serde(default, alias = "patient_id")]
    pub paciente_id: Option<String>,
    #[serde(alias = "specialist_id")]
    pub especialista_id: String,
    #[serde(alias = "specialty")]
    pub especialidad: String,
    #[serde(alias = "date")]
    pub fecha: NaiveDate,
    #[serde(alias = "time")]
    pub hora: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentRequest {
    pub comentario: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteRequest {
    #[serde(alias = "reseña")]
    pub resena: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateRequest {
    pub puntaje: i32,
    pub comentario: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyRequest {
    pub comentario: String,
    pub estrellas: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub especialidad: Option<String>,
    pub especialista_id: Option<String>,
    pub paciente_id: Option<String>,
    pub estado: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpecialistDashboard {
    pub pendientes: usize,
    pub aceptados: usize,
    pub realizados: usize,
    pub pacientes: usize,
    pub proximos: Vec<Appointment>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Turno no encontrado")]
    NotFound,

    #[error("El horario solicitado no está disponible")]
    SlotNotAvailable,

    #[error("Paciente no encontrado")]
    PatientNotFound,

    #[error("Especialista no encontrado")]
    SpecialistNotFound,

    #[error("El especialista no atiende la especialidad {0}")]
    SpecialtyNotOffered(String),

    #[error("El turno no admite esta acción en estado {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("La atención ya fue calificada")]
    AlreadyRated,

    #[error("La encuesta no está disponible para este turno")]
    SurveyNotAvailable,

    #[error("No tiene permiso para operar sobre este turno")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::SpecialistNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotNotAvailable
            | AppointmentError::InvalidStatusTransition(_)
            | AppointmentError::AlreadyRated
            | AppointmentError::SurveyNotAvailable => AppError::Conflict(err.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::SpecialtyNotOffered(_) => AppError::ValidationError(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

impl From<profile_cell::ProfileError> for AppointmentError {
    fn from(err: profile_cell::ProfileError) -> Self {
        match err {
            profile_cell::ProfileError::NotFound => AppointmentError::PatientNotFound,
            profile_cell::ProfileError::NotASpecialist => AppointmentError::SpecialistNotFound,
            profile_cell::ProfileError::Forbidden(msg) => AppointmentError::Forbidden(msg),
            profile_cell::ProfileError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            profile_cell::ProfileError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

impl From<specialist_cell::SpecialistError> for AppointmentError {
    fn from(err: specialist_cell::SpecialistError) -> Self {
        match err {
            specialist_cell::SpecialistError::NotFound => AppointmentError::SpecialistNotFound,
            specialist_cell::SpecialistError::SpecialtyNotOffered(s) => AppointmentError::SpecialtyNotOffered(s),
            specialist_cell::SpecialistError::Forbidden(msg) => AppointmentError::Forbidden(msg),
            specialist_cell::SpecialistError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
            other => AppointmentError::ValidationError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_uses_spanish_wire_names() {
        let status: AppointmentStatus = serde_json::from_value(json!("realizado")).unwrap();
        assert_eq!(status, AppointmentStatus::Completed);
        assert_eq!(json!(AppointmentStatus::Rejected), json!("rechazado"));

        let legacy: AppointmentStatus = serde_json::from_value(json!("confirmado")).unwrap();
        assert_eq!(legacy, AppointmentStatus::Accepted);
    }

    #[test]
    fn appointment_row_tolerates_missing_optional_columns() {
        let appointment: Appointment = serde_json::from_value(json!({
            "id": "t1",
            "pacienteid": "p1",
            "especialistaid": "s1",
            "fecha": "2024-01-15T09:30:00",
            "estado": "aceptado",
            "resena": "   "
        }))
        .unwrap();

        assert!(!appointment.has_review());
        assert!(!appointment.survey_completed());
        assert!(appointment.involves("s1"));
        assert_eq!(appointment.scheduled_at().unwrap().to_string(), "2024-01-15 09:30:00");
    }

    #[test]
    fn record_with_null_fields_has_no_entries() {
        let record: LinkedRecord = serde_json::from_value(json!({
            "turno_id": "t1",
            "datos_dinamicos": null
        }))
        .unwrap();
        assert!(record.fields().is_empty());
    }
}

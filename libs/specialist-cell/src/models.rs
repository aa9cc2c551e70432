use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use shared_models::error::AppError;
use shared_utils::format::{format_time_12h, parse_clock_time, parse_spanish_weekday, same_specialty};

pub const DEFAULT_SPECIALTY_IMAGE: &str = "https://cdn-icons-png.flaticon.com/512/2785/2785490.png";

// ==============================================================================
// SPECIALTIES
// ==============================================================================

/// Row of `especialidades`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialty {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub imagen_url: Option<String>,
    #[serde(default = "default_active")]
    pub activa: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialtyWithImage {
    pub nombre: String,
    pub imagen: String,
}

impl From<Specialty> for SpecialtyWithImage {
    fn from(specialty: Specialty) -> Self {
        let imagen = specialty
            .imagen_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SPECIALTY_IMAGE.to_string());
        Self {
            nombre: specialty.nombre,
            imagen,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSpecialtyRequest {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub imagen_url: Option<String>,
}

/// Stored form of a specialty name.
pub fn normalize_specialty_name(name: &str) -> String {
    name.trim().to_lowercase()
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

/// Row of `disponibilidad`: a recurring weekly window for one specialty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub especialista_id: String,
    pub especialidad: String,
    pub dia: String,
    pub hora_inicio: String,
    pub hora_fin: String,
}

impl Availability {
    pub fn weekday(&self) -> Option<Weekday> {
        parse_spanish_weekday(&self.dia)
    }

    pub fn window(&self) -> Option<TimeWindow> {
        Some(TimeWindow {
            start: parse_clock_time(&self.hora_inicio)?,
            end: parse_clock_time(&self.hora_fin)?,
        })
    }

    pub fn is_for_specialty(&self, specialty: &str) -> bool {
        same_specialty(&self.especialidad, specialty)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub especialidad: String,
    pub dia: String,
    pub hora_inicio: String,
    pub hora_fin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn label(&self) -> String {
        format_time_12h(self.start)
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("TimeSlot", 3)?;
        state.serialize_field("hora_inicio", &self.start.format("%H:%M").to_string())?;
        state.serialize_field("hora_fin", &self.end.format("%H:%M").to_string())?;
        state.serialize_field("etiqueta", &self.label())?;
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailableDay {
    pub fecha: NaiveDate,
    pub etiqueta: String,
    pub ventanas: Vec<TimeWindow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailableDaysQuery {
    pub specialty: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailableSlotsQuery {
    pub specialty: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecialtiesQuery {
    pub with_images: Option<bool>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SpecialistError {
    #[error("Especialista no encontrado")]
    NotFound,

    #[error("Disponibilidad no encontrada")]
    AvailabilityNotFound,

    #[error("Día inválido: {0}. Los días de atención son de Lunes a Sábado")]
    InvalidDay(String),

    #[error("La hora de inicio debe ser anterior a la hora de fin")]
    InvalidTimeRange,

    #[error("El horario debe estar dentro del horario de la clínica ({0})")]
    OutsideClinicHours(String),

    #[error("El especialista no atiende la especialidad {0}")]
    SpecialtyNotOffered(String),

    #[error("El horario se superpone con otra disponibilidad del {0}")]
    Overlap(String),

    #[error("La especialidad {0} ya existe")]
    DuplicateSpecialty(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<SpecialistError> for AppError {
    fn from(err: SpecialistError) -> Self {
        match err {
            SpecialistError::NotFound | SpecialistError::AvailabilityNotFound => {
                AppError::NotFound(err.to_string())
            }
            SpecialistError::DuplicateSpecialty(_) | SpecialistError::Overlap(_) => {
                AppError::Conflict(err.to_string())
            }
            SpecialistError::Forbidden(msg) => AppError::Forbidden(msg),
            SpecialistError::DatabaseError(msg) => AppError::Database(msg),
            SpecialistError::ValidationError(msg) => AppError::ValidationError(msg),
            SpecialistError::InvalidDay(_)
            | SpecialistError::InvalidTimeRange
            | SpecialistError::OutsideClinicHours(_)
            | SpecialistError::SpecialtyNotOffered(_) => AppError::ValidationError(err.to_string()),
        }
    }
}

impl From<profile_cell::ProfileError> for SpecialistError {
    fn from(err: profile_cell::ProfileError) -> Self {
        match err {
            profile_cell::ProfileError::NotFound => SpecialistError::NotFound,
            profile_cell::ProfileError::Forbidden(msg) => SpecialistError::Forbidden(msg),
            profile_cell::ProfileError::DatabaseError(msg) => SpecialistError::DatabaseError(msg),
            other => SpecialistError::ValidationError(other.to_string()),
        }
    }
}

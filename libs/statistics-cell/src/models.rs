use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shared_models::error::AppError;

pub const NO_SPECIALTY: &str = "Sin especialidad";
pub const NO_SPECIALIST: &str = "Sin médico";
pub const DEFAULT_RANGE_DAYS: i64 = 30;

// ==============================================================================
// ACCESS LOG
// ==============================================================================

/// A row of `logs_ingresos`, written on every successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLog {
    #[serde(default)]
    pub id: Option<Value>,
    pub usuario_id: String,
    #[serde(default)]
    pub usuario_nombre: String,
    #[serde(default)]
    pub usuario_tipo: String,
    pub fecha_hora: String,
}

// ==============================================================================
// QUERIES
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    #[serde(default, alias = "desde")]
    pub from: Option<NaiveDate>,
    #[serde(default, alias = "hasta")]
    pub to: Option<NaiveDate>,
}

impl DateRangeQuery {
    pub fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

// ==============================================================================
// AGGREGATES
// ==============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CountEntry {
    pub nombre: String,
    pub cantidad: usize,
    pub porcentaje: f64,
}

/// Appointments on one calendar day, `fecha` as dd/mm/yyyy.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayCount {
    pub fecha: String,
    pub cantidad: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StatusSummary {
    pub pendientes: usize,
    pub aceptados: usize,
    pub realizados: usize,
    pub cancelados: usize,
    pub rechazados: usize,
    pub tasa_finalizacion: f64,
    pub tasa_cancelacion: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentStatistics {
    pub desde: NaiveDate,
    pub hasta: NaiveDate,
    pub total: usize,
    pub by_specialty: Vec<CountEntry>,
    pub by_day: Vec<DayCount>,
    pub by_specialist: Vec<CountEntry>,
    pub completed_by_specialist: Vec<CountEntry>,
    pub summary: StatusSummary,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StatisticsError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Export error: {0}")]
    ExportError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StatisticsError> for AppError {
    fn from(err: StatisticsError) -> Self {
        match err {
            StatisticsError::ValidationError(msg) => AppError::ValidationError(msg),
            StatisticsError::ExportError(msg) => AppError::Internal(msg),
            StatisticsError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

impl From<csv::Error> for StatisticsError {
    fn from(err: csv::Error) -> Self {
        StatisticsError::ExportError(err.to_string())
    }
}

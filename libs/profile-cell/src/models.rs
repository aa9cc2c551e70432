use serde::{Deserialize, Serialize};
use serde_json::Value;

use shared_models::error::AppError;
use shared_models::role::Role;
use shared_utils::format::same_specialty;

// ==============================================================================
// PROFILE MODELS
// ==============================================================================

/// Row of the `perfiles` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub nombre: String,
    pub apellido: String,
    #[serde(default)]
    pub edad: Option<i32>,
    #[serde(default)]
    pub dni: Option<String>,
    pub email: String,
    pub tipo: Role,
    #[serde(default)]
    pub imagen_perfil: Option<String>,
    #[serde(default)]
    pub imagen_perfil2: Option<String>,
    #[serde(default)]
    pub obra_social: Option<String>,
    /// Comma separated string or JSON array, depending on who wrote the row.
    #[serde(default)]
    pub especialidad: Option<Value>,
    #[serde(default)]
    pub aprobado: bool,
    #[serde(default)]
    pub rechazado: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Profile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.nombre.trim(), self.apellido.trim())
            .trim()
            .to_string()
    }

    pub fn specialties(&self) -> Vec<String> {
        self.especialidad
            .as_ref()
            .map(parse_specialties)
            .unwrap_or_default()
    }

    /// The profile's own spelling of `specialty`, if offered.
    pub fn find_specialty(&self, specialty: &str) -> Option<String> {
        self.specialties()
            .into_iter()
            .find(|s| same_specialty(s, specialty))
    }

    pub fn offers_specialty(&self, specialty: &str) -> bool {
        self.find_specialty(specialty).is_some()
    }

    pub fn is_specialist(&self) -> bool {
        self.tipo == Role::Specialist
    }
}

/// Public fields returned by the quick-access lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProfile {
    pub email: String,
    pub nombre: String,
    pub apellido: String,
    pub tipo: Role,
    #[serde(default)]
    pub imagen_perfil: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistStatus {
    Approved,
    Rejected,
    Pending,
}

/// Rejection wins over approval.
pub fn specialist_status(profile: &Profile) -> SpecialistStatus {
    if profile.rechazado {
        SpecialistStatus::Rejected
    } else if profile.aprobado {
        SpecialistStatus::Approved
    } else {
        SpecialistStatus::Pending
    }
}

/// Accepts a JSON array of names or a comma separated string.
pub fn parse_specialties(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[') {
                if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
                    return parse_specialties(&Value::Array(items));
                }
            }
            trimmed.split(',').map(str::to_string).collect()
        }
        _ => Vec::new(),
    };

    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub edad: Option<i32>,
    pub obra_social: Option<String>,
    pub imagen_perfil: Option<String>,
    pub imagen_perfil2: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfilesByEmailsRequest {
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListSpecialistsQuery {
    pub specialty: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Perfil no encontrado")]
    NotFound,

    #[error("El usuario no es un especialista")]
    NotASpecialist,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound => AppError::NotFound(err.to_string()),
            ProfileError::NotASpecialist => AppError::BadRequest(err.to_string()),
            ProfileError::Forbidden(msg) => AppError::Forbidden(msg),
            ProfileError::ValidationError(msg) => AppError::ValidationError(msg),
            ProfileError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

use serde::{Deserialize, Serialize};

use profile_cell::{specialist_status, Profile, ProfileError, SpecialistStatus};
use shared_models::error::AppError;
use shared_models::role::Role;
use statistics_cell::StatisticsError;

// ==============================================================================
// REGISTRATION REQUESTS
// ==============================================================================

/// Fields every registration form shares.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountFields {
    pub nombre: String,
    pub apellido: String,
    pub edad: i32,
    pub dni: String,
    pub email: String,
    pub password: String,
    #[serde(alias = "confirmPassword", alias = "password_confirmation")]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterPatientRequest {
    #[serde(flatten)]
    pub account: AccountFields,
    pub obra_social: String,
    /// Data URL (`data:image/png;base64,...`) or an existing image URL.
    #[serde(default)]
    pub imagen_perfil: Option<String>,
    #[serde(default)]
    pub imagen_perfil2: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterSpecialistRequest {
    #[serde(flatten)]
    pub account: AccountFields,
    #[serde(alias = "especialidad")]
    pub especialidades: Vec<String>,
    #[serde(default)]
    pub imagen_perfil: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAdministratorRequest {
    #[serde(flatten)]
    pub account: AccountFields,
    #[serde(default)]
    pub imagen_perfil: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResponse {
    pub profile: Profile,
    pub message: String,
}

// ==============================================================================
// SESSION
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub profile: Profile,
    pub landing: String,
}

/// Whether an account may open a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    EmailNotConfirmed,
    PendingApproval,
    Rejected,
}

impl AccountStatus {
    /// Administrators always pass. Everyone else needs a confirmed email, and
    /// specialists also need an approval that was not overturned.
    pub fn evaluate(profile: &Profile, email_confirmed: bool) -> Self {
        if profile.tipo == Role::Administrator {
            return AccountStatus::Active;
        }
        if !email_confirmed {
            return AccountStatus::EmailNotConfirmed;
        }
        if profile.is_specialist() {
            return match specialist_status(profile) {
                SpecialistStatus::Approved => AccountStatus::Active,
                SpecialistStatus::Rejected => AccountStatus::Rejected,
                SpecialistStatus::Pending => AccountStatus::PendingApproval,
            };
        }
        AccountStatus::Active
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }

    pub fn message(&self) -> &'static str {
        match self {
            AccountStatus::Active => "Cuenta activa",
            AccountStatus::EmailNotConfirmed => {
                "Debes confirmar tu email antes de iniciar sesión. Revisa tu bandeja de entrada."
            }
            AccountStatus::PendingApproval => {
                "Tu cuenta de especialista está pendiente de aprobación por el administrador."
            }
            AccountStatus::Rejected => "Tu cuenta de especialista fue rechazada por el administrador.",
        }
    }
}

/// User-facing text for a sign-in failure reported by the auth service.
pub fn login_error_message(raw: &str) -> String {
    if raw.contains("Invalid login credentials") {
        "Email o contraseña incorrectos".to_string()
    } else if raw.contains("Email not confirmed") {
        "Debes confirmar tu email antes de iniciar sesión".to_string()
    } else if raw.contains("Too many requests") {
        "Demasiados intentos. Intenta más tarde".to_string()
    } else {
        format!("Error al iniciar sesión: {}", raw)
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{}", .0.message())]
    AccountBlocked(AccountStatus),

    #[error("El usuario no tiene un perfil registrado")]
    ProfileMissing,

    #[error("Ya existe un usuario registrado con ese DNI")]
    NationalIdTaken,

    #[error("El email ya está registrado")]
    EmailTaken,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Auth service error: {0}")]
    ExternalService(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials(msg) => AppError::Auth(msg),
            AuthError::AccountBlocked(_) | AuthError::ProfileMissing => AppError::Forbidden(err.to_string()),
            AuthError::NationalIdTaken | AuthError::EmailTaken => AppError::Conflict(err.to_string()),
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
            AuthError::ValidationError(msg) => AppError::ValidationError(msg),
            AuthError::ExternalService(msg) => AppError::ExternalService(msg),
            AuthError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

impl From<ProfileError> for AuthError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound => AuthError::ProfileMissing,
            ProfileError::NotASpecialist => AuthError::ValidationError(err.to_string()),
            ProfileError::Forbidden(msg) => AuthError::Forbidden(msg),
            ProfileError::ValidationError(msg) => AuthError::ValidationError(msg),
            ProfileError::DatabaseError(msg) => AuthError::DatabaseError(msg),
        }
    }
}

impl From<StatisticsError> for AuthError {
    fn from(err: StatisticsError) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

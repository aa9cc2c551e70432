use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use profile_cell::Profile;
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::role::Role;
use shared_utils::validation::{
    passwords_match, validate_age, validate_email, validate_national_id, validate_password,
    validate_required,
};

use crate::models::{
    AccountFields, AuthError, RegisterAdministratorRequest, RegisterPatientRequest,
    RegisterSpecialistRequest, RegistrationResponse,
};
use crate::services::images::{self, ProfileImage};

const VERIFY_EMAIL_MESSAGE: &str =
    "Registro exitoso. Revisa tu email para confirmar la cuenta antes de iniciar sesión.";

/// Auth user id and, when the platform opened one, the session token.
struct CreatedUser {
    id: String,
    access_token: Option<String>,
}

pub struct RegistrationService {
    supabase: SupabaseClient,
    bucket: String,
}

impl RegistrationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            bucket: config.profile_images_bucket.clone(),
        }
    }

    // ==========================================================================
    // VALIDATION
    // ==========================================================================

    fn validate_account(account: &AccountFields) -> Result<(), AuthError> {
        validate_required(&account.nombre, "nombre")
            .and_then(|_| validate_required(&account.apellido, "apellido"))
            .and_then(|_| validate_age(account.edad))
            .and_then(|_| validate_national_id(&account.dni))
            .and_then(|_| validate_email(account.email.trim()))
            .and_then(|_| validate_password(&account.password))
            .and_then(|_| passwords_match(&account.password, &account.confirm_password))
            .map_err(AuthError::ValidationError)
    }

    fn clean_specialties(specialties: &[String]) -> Result<Vec<String>, AuthError> {
        let cleaned: Vec<String> = specialties
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if cleaned.is_empty() {
            return Err(AuthError::ValidationError(
                "Debe indicar al menos una especialidad".to_string(),
            ));
        }
        Ok(cleaned)
    }

    // ==========================================================================
    // NATIONAL ID
    // ==========================================================================

    pub async fn national_id_exists(&self, dni: &str) -> Result<bool, AuthError> {
        let path = format!(
            "/rest/v1/perfiles?select=user_id&dni=eq.{}",
            urlencoding::encode(dni.trim())
        );
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        Ok(!rows.is_empty())
    }

    // ==========================================================================
    // STEPS
    // ==========================================================================

    async fn create_auth_user(&self, account: &AccountFields, role: Role) -> Result<CreatedUser, AuthError> {
        let metadata = json!({
            "nombre": account.nombre.trim(),
            "apellido": account.apellido.trim(),
            "tipo": role.as_str(),
        });

        let response = self.supabase
            .sign_up(&account.email, &account.password, metadata)
            .await
            .map_err(|e| match SupabaseError::from_anyhow(&e) {
                Some(err) if err.message().contains("already registered") => AuthError::EmailTaken,
                Some(err) => AuthError::ExternalService(err.message().to_string()),
                None => AuthError::ExternalService(e.to_string()),
            })?;

        let id = response
            .get("user")
            .and_then(|user| user.get("id"))
            .or_else(|| response.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AuthError::ExternalService("No se pudo obtener el ID del usuario".to_string()))?;

        let access_token = response
            .get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(CreatedUser { id, access_token })
    }

    /// Uploads an inline picture, falling back to a placeholder when the upload
    /// fails.
    async fn store_image(&self, value: Option<&str>, user: &CreatedUser) -> Option<String> {
        match ProfileImage::parse(value?)? {
            ProfileImage::Url(url) => Some(url),
            ProfileImage::Inline { content_type, extension, payload } => {
                let name = images::object_name(&user.id, Utc::now().timestamp_millis(), &extension);

                let uploaded = match images::decode_payload(&payload) {
                    Ok(bytes) => self.supabase
                        .upload_object(&self.bucket, &name, bytes, &content_type, user.access_token.as_deref())
                        .await
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e),
                };

                match uploaded {
                    Ok(_) => Some(self.supabase.public_object_url(&self.bucket, &name)),
                    Err(e) => {
                        warn!("Profile image upload failed for {}: {}", user.id, e);
                        Some(images::placeholder_url(&extension))
                    }
                }
            }
        }
    }

    async fn insert_profile(&self, row: Value, user: &CreatedUser) -> Result<Profile, AuthError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/perfiles",
                user.access_token.as_deref(),
                Some(row),
                Some(headers),
            )
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::DatabaseError("Failed to create profile".to_string()))?;

        serde_json::from_value(created).map_err(|e| AuthError::DatabaseError(format!("Invalid profile row: {}", e)))
    }

    /// Shared flow: uniqueness check, auth user, pictures, profile row.
    async fn register(
        &self,
        account: &AccountFields,
        role: Role,
        extra: Map<String, Value>,
        pictures: &[(&str, Option<&str>)],
    ) -> Result<RegistrationResponse, AuthError> {
        Self::validate_account(account)?;

        if self.national_id_exists(&account.dni).await? {
            warn!("Registration rejected, national id already in use");
            return Err(AuthError::NationalIdTaken);
        }

        let user = self.create_auth_user(account, role).await?;
        debug!("Auth user {} created as {}", user.id, role);

        let now = Utc::now().to_rfc3339();
        let mut row = json!({
            "user_id": user.id,
            "nombre": account.nombre.trim(),
            "apellido": account.apellido.trim(),
            "edad": account.edad,
            "dni": account.dni.trim(),
            "email": account.email.trim().to_lowercase(),
            "tipo": role.as_str(),
            "aprobado": false,
            "rechazado": false,
            "created_at": now,
            "updated_at": now,
        });

        if let Some(fields) = row.as_object_mut() {
            for (column, value) in pictures {
                if let Some(url) = self.store_image(*value, &user).await {
                    fields.insert(column.to_string(), Value::String(url));
                }
            }
            fields.extend(extra);
        }

        let profile = self.insert_profile(row, &user).await?;
        info!("Registered {} {}", role, profile.user_id);

        Ok(RegistrationResponse {
            profile,
            message: VERIFY_EMAIL_MESSAGE.to_string(),
        })
    }

    // ==========================================================================
    // PUBLIC OPERATIONS
    // ==========================================================================

    pub async fn register_patient(&self, request: RegisterPatientRequest) -> Result<RegistrationResponse, AuthError> {
        validate_required(&request.obra_social, "obra social").map_err(AuthError::ValidationError)?;

        let mut extra = Map::new();
        extra.insert("obra_social".to_string(), json!(request.obra_social.trim()));

        self.register(
            &request.account,
            Role::Patient,
            extra,
            &[
                ("imagen_perfil", request.imagen_perfil.as_deref()),
                ("imagen_perfil2", request.imagen_perfil2.as_deref()),
            ],
        )
        .await
    }

    pub async fn register_specialist(
        &self,
        request: RegisterSpecialistRequest,
    ) -> Result<RegistrationResponse, AuthError> {
        let specialties = Self::clean_specialties(&request.especialidades)?;

        let mut extra = Map::new();
        extra.insert("especialidad".to_string(), json!(specialties.join(", ")));

        self.register(
            &request.account,
            Role::Specialist,
            extra,
            &[("imagen_perfil", request.imagen_perfil.as_deref())],
        )
        .await
    }

    pub async fn register_administrator(
        &self,
        request: RegisterAdministratorRequest,
    ) -> Result<RegistrationResponse, AuthError> {
        self.register(
            &request.account,
            Role::Administrator,
            Map::new(),
            &[("imagen_perfil", request.imagen_perfil.as_deref())],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn account() -> AccountFields {
        AccountFields {
            nombre: "Ana".to_string(),
            apellido: "García".to_string(),
            edad: 30,
            dni: "30123456".to_string(),
            email: "ana@clinica.com".to_string(),
            password: "Secreta123".to_string(),
            confirm_password: "Secreta123".to_string(),
        }
    }

    #[test]
    fn accepts_a_complete_account() {
        assert!(RegistrationService::validate_account(&account()).is_ok());
    }

    #[test]
    fn rejects_mismatched_passwords() {
        let mut fields = account();
        fields.confirm_password = "Otra1234".to_string();
        assert_matches!(
            RegistrationService::validate_account(&fields),
            Err(AuthError::ValidationError(msg)) if msg.contains("no coinciden")
        );
    }

    #[test]
    fn rejects_blank_names_and_bad_ids() {
        let mut fields = account();
        fields.nombre = "  ".to_string();
        assert!(RegistrationService::validate_account(&fields).is_err());

        let mut fields = account();
        fields.dni = "12ab".to_string();
        assert!(RegistrationService::validate_account(&fields).is_err());
    }

    #[test]
    fn specialists_need_a_specialty() {
        assert!(RegistrationService::clean_specialties(&[" ".to_string()]).is_err());
        assert_eq!(
            RegistrationService::clean_specialties(&[" cardiologia ".to_string(), "".to_string()]).unwrap(),
            vec!["cardiologia".to_string()]
        );
    }
}

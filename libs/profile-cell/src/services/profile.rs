use std::collections::HashSet;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::role::Role;
use shared_utils::validation::{validate_age, validate_required};

use crate::models::{Profile, ProfileError, PublicProfile, UpdateProfileRequest};

pub struct ProfileService {
    supabase: SupabaseClient,
}

impl ProfileService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch_profiles(&self, query: &str, auth_token: &str) -> Result<Vec<Profile>, ProfileError> {
        let path = format!("/rest/v1/perfiles?{}", query);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProfileError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| ProfileError::DatabaseError(format!("Invalid profile row: {}", e)))
            })
            .collect()
    }

    pub async fn find_profile(&self, user_id: &str, auth_token: &str) -> Result<Option<Profile>, ProfileError> {
        debug!("Fetching profile for user: {}", user_id);
        let query = format!("user_id=eq.{}", urlencoding::encode(user_id));
        Ok(self.fetch_profiles(&query, auth_token).await?.into_iter().next())
    }

    pub async fn get_profile(&self, user_id: &str, auth_token: &str) -> Result<Profile, ProfileError> {
        self.find_profile(user_id, auth_token)
            .await?
            .ok_or(ProfileError::NotFound)
    }

    /// Clinic role of the caller, taken from its profile row.
    pub async fn caller_role(&self, user_id: &str, auth_token: &str) -> Result<Role, ProfileError> {
        match self.find_profile(user_id, auth_token).await? {
            Some(profile) => Ok(profile.tipo),
            None => {
                warn!("Authenticated user {} has no profile", user_id);
                Err(ProfileError::Forbidden("El usuario no tiene un perfil registrado".to_string()))
            }
        }
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
        auth_token: &str,
    ) -> Result<Profile, ProfileError> {
        debug!("Updating profile for user: {}", user_id);

        let mut update_data = Map::new();

        if let Some(nombre) = request.nombre {
            validate_required(&nombre, "nombre").map_err(ProfileError::ValidationError)?;
            update_data.insert("nombre".to_string(), json!(nombre.trim()));
        }
        if let Some(apellido) = request.apellido {
            validate_required(&apellido, "apellido").map_err(ProfileError::ValidationError)?;
            update_data.insert("apellido".to_string(), json!(apellido.trim()));
        }
        if let Some(edad) = request.edad {
            validate_age(edad).map_err(ProfileError::ValidationError)?;
            update_data.insert("edad".to_string(), json!(edad));
        }
        if let Some(obra_social) = request.obra_social {
            update_data.insert("obra_social".to_string(), json!(obra_social.trim()));
        }
        if let Some(imagen) = request.imagen_perfil {
            update_data.insert("imagen_perfil".to_string(), json!(imagen));
        }
        if let Some(imagen) = request.imagen_perfil2 {
            update_data.insert("imagen_perfil2".to_string(), json!(imagen));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.patch_profile(user_id, Value::Object(update_data), auth_token).await
    }

    async fn patch_profile(&self, user_id: &str, body: Value, auth_token: &str) -> Result<Profile, ProfileError> {
        let path = format!("/rest/v1/perfiles?user_id=eq.{}", urlencoding::encode(user_id));
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| ProfileError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(ProfileError::NotFound)?;
        serde_json::from_value(row).map_err(|e| ProfileError::DatabaseError(e.to_string()))
    }

    pub async fn list_users(&self, role: Option<Role>, auth_token: &str) -> Result<Vec<Profile>, ProfileError> {
        let mut query = String::from("order=created_at.desc");
        if let Some(role) = role {
            query = format!("tipo=eq.{}&{}", role.as_str(), query);
        }
        self.fetch_profiles(&query, auth_token).await
    }

    pub async fn list_patients(&self, auth_token: &str) -> Result<Vec<Profile>, ProfileError> {
        self.fetch_profiles("tipo=eq.paciente&order=apellido.asc", auth_token).await
    }

    pub async fn list_specialists(
        &self,
        specialty: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<Profile>, ProfileError> {
        let specialists = self
            .fetch_profiles("tipo=eq.especialista&order=apellido.asc", auth_token)
            .await?;

        Ok(match specialty {
            Some(wanted) => specialists
                .into_iter()
                .filter(|p| p.offers_specialty(wanted))
                .collect(),
            None => specialists,
        })
    }

    pub async fn list_pending_specialists(&self, auth_token: &str) -> Result<Vec<Profile>, ProfileError> {
        self.fetch_profiles(
            "tipo=eq.especialista&aprobado=eq.false&rechazado=eq.false&order=created_at.desc",
            auth_token,
        )
        .await
    }

    async fn set_specialist_flags(
        &self,
        user_id: &str,
        flags: Value,
        auth_token: &str,
    ) -> Result<Profile, ProfileError> {
        let profile = self.get_profile(user_id, auth_token).await?;
        if !profile.is_specialist() {
            return Err(ProfileError::NotASpecialist);
        }

        let mut body = flags;
        body["updated_at"] = json!(Utc::now().to_rfc3339());
        self.patch_profile(user_id, body, auth_token).await
    }

    pub async fn approve_specialist(&self, user_id: &str, auth_token: &str) -> Result<Profile, ProfileError> {
        info!("Approving specialist {}", user_id);
        self.set_specialist_flags(user_id, json!({ "aprobado": true, "rechazado": false }), auth_token)
            .await
    }

    pub async fn reject_specialist(&self, user_id: &str, auth_token: &str) -> Result<Profile, ProfileError> {
        info!("Rejecting specialist {}", user_id);
        self.set_specialist_flags(user_id, json!({ "aprobado": false, "rechazado": true }), auth_token)
            .await
    }

    pub async fn revoke_specialist_approval(&self, user_id: &str, auth_token: &str) -> Result<Profile, ProfileError> {
        info!("Revoking approval of specialist {}", user_id);
        self.set_specialist_flags(user_id, json!({ "aprobado": false }), auth_token)
            .await
    }

    pub async fn profiles_by_emails(
        &self,
        emails: &[String],
        auth_token: Option<&str>,
    ) -> Result<Vec<PublicProfile>, ProfileError> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        let list = emails
            .iter()
            .map(|e| format!("\"{}\"", e.trim().to_lowercase()))
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/perfiles?select=email,nombre,apellido,imagen_perfil,tipo&email=in.({})",
            urlencoding::encode(&list)
        );

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| ProfileError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| ProfileError::DatabaseError(e.to_string())))
            .collect()
    }

    /// Every specialty offered by at least one specialist, in first-seen order.
    pub async fn distinct_specialties(&self, auth_token: &str) -> Result<Vec<String>, ProfileError> {
        let specialists = self.list_specialists(None, auth_token).await?;
        Ok(distinct_specialties_of(&specialists))
    }

    /// Profiles of the given users keyed by `user_id`, loaded in one request.
    pub async fn profiles_by_ids(
        &self,
        user_ids: &[String],
        auth_token: &str,
    ) -> Result<Vec<Profile>, ProfileError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("user_id=in.({})", user_ids.join(","));
        self.fetch_profiles(&query, auth_token).await
    }
}

pub fn distinct_specialties_of(profiles: &[Profile]) -> Vec<String> {
    let mut seen = HashSet::new();
    profiles
        .iter()
        .flat_map(|p| p.specialties())
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}

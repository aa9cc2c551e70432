use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{
    normalize_specialty_name, CreateSpecialtyRequest, SpecialistError, Specialty, SpecialtyWithImage,
};

pub struct SpecialtyService {
    supabase: SupabaseClient,
}

impl SpecialtyService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch(&self, query: &str, auth_token: Option<&str>) -> Result<Vec<Specialty>, SpecialistError> {
        let path = format!("/rest/v1/especialidades?{}", query);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| SpecialistError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| SpecialistError::DatabaseError(e.to_string())))
            .collect()
    }

    pub async fn list_active(&self, auth_token: Option<&str>) -> Result<Vec<Specialty>, SpecialistError> {
        debug!("Listing active specialties");
        self.fetch("activa=eq.true&order=nombre.asc", auth_token).await
    }

    pub async fn list_with_images(&self, auth_token: Option<&str>) -> Result<Vec<SpecialtyWithImage>, SpecialistError> {
        let specialties = self.fetch("select=nombre,imagen_url&order=nombre.asc", auth_token).await?;
        Ok(specialties.into_iter().map(SpecialtyWithImage::from).collect())
    }

    pub async fn specialty_exists(&self, name: &str, auth_token: Option<&str>) -> Result<bool, SpecialistError> {
        let normalized = normalize_specialty_name(name);
        if normalized.is_empty() {
            return Ok(false);
        }

        let query = format!(
            "select=nombre&nombre=eq.{}&activa=eq.true",
            urlencoding::encode(&normalized)
        );
        Ok(!self.fetch(&query, auth_token).await?.is_empty())
    }

    pub async fn add_specialty(
        &self,
        request: CreateSpecialtyRequest,
        auth_token: &str,
    ) -> Result<Specialty, SpecialistError> {
        let nombre = normalize_specialty_name(&request.nombre);
        if nombre.is_empty() {
            return Err(SpecialistError::ValidationError(
                "El nombre de la especialidad es obligatorio".to_string(),
            ));
        }

        if self.specialty_exists(&nombre, Some(auth_token)).await? {
            return Err(SpecialistError::DuplicateSpecialty(nombre));
        }

        let row = json!({
            "nombre": nombre,
            "descripcion": request.descripcion.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            "imagen_url": request.imagen_url.filter(|u| !u.trim().is_empty()),
            "activa": true,
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase
            .request_with_headers(Method::POST, "/rest/v1/especialidades", Some(auth_token), Some(row), Some(headers))
            .await
            .map_err(|e| match SupabaseError::from_anyhow(&e) {
                Some(SupabaseError::Conflict(_)) => SpecialistError::DuplicateSpecialty(nombre.clone()),
                _ => SpecialistError::DatabaseError(e.to_string()),
            })?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| SpecialistError::DatabaseError("Failed to create specialty".to_string()))?;

        info!("Specialty created: {}", nombre);
        serde_json::from_value(created).map_err(|e| SpecialistError::DatabaseError(e.to_string()))
    }
}

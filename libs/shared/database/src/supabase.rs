use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION, CACHE_CONTROL},
    Method, Response,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Classified failure from one of the platform APIs.
///
/// Carried inside the `anyhow::Error` returned by [`SupabaseClient`]; use
/// [`SupabaseError::from_anyhow`] to inspect it.
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl SupabaseError {
    pub fn from_anyhow(err: &anyhow::Error) -> Option<&SupabaseError> {
        err.downcast_ref::<SupabaseError>()
    }

    /// Human readable message extracted from the platform body.
    pub fn message(&self) -> &str {
        match self {
            SupabaseError::Auth(msg)
            | SupabaseError::NotFound(msg)
            | SupabaseError::Conflict(msg) => msg,
            SupabaseError::Api { message, .. } => message,
        }
    }

    fn classify(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|v| {
                ["msg", "error_description", "message", "error"]
                    .iter()
                    .find_map(|key| v.get(*key).and_then(Value::as_str))
            })
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        let code = parsed
            .as_ref()
            .and_then(|v| v.get("code"))
            .and_then(|c| c.as_str().map(str::to_string));

        if status == 409 || code.as_deref() == Some("23505") {
            return SupabaseError::Conflict(message);
        }

        match status {
            401 | 403 => SupabaseError::Auth(message),
            404 => SupabaseError::NotFound(message),
            _ => SupabaseError::Api { status, message },
        }
    }
}

enum Payload {
    Json(Value),
    Bytes { data: Vec<u8>, content_type: String },
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        payload: Option<Payload>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url);

        match payload {
            Some(Payload::Json(body)) => {
                req = req.headers(headers).json(&body);
            }
            Some(Payload::Bytes { data, content_type }) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_str(&content_type)?);
                req = req.headers(headers).body(data);
            }
            None => {
                req = req.headers(headers);
            }
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseError::classify(status.as_u16(), &error_text).into());
        }

        Ok(response)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let response = self
            .send(method, path, auth_token, body.map(Payload::Json), headers)
            .await?;

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Same as [`request`](Self::request) but discards the response body.
    pub async fn request_empty(&self, method: Method, path: &str,
                               auth_token: Option<&str>, body: Option<Value>)
                               -> Result<()> {
        self.send(method, path, auth_token, body.map(Payload::Json), None).await?;
        Ok(())
    }

    // ==========================================================================
    // AUTH
    // ==========================================================================

    /// Creates an auth user. `metadata` ends up in `user_metadata`.
    pub async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<Value> {
        let body = json!({
            "email": email.trim().to_lowercase(),
            "password": password,
            "data": metadata,
        });

        self.request(Method::POST, "/auth/v1/signup", None, Some(body)).await
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Value> {
        let body = json!({
            "email": email.trim().to_lowercase(),
            "password": password,
        });

        self.request(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(body),
        ).await
    }

    pub async fn sign_out(&self, auth_token: &str) -> Result<()> {
        self.request_empty(Method::POST, "/auth/v1/logout", Some(auth_token), None).await
    }

    pub async fn get_auth_user(&self, auth_token: &str) -> Result<Value> {
        self.request(Method::GET, "/auth/v1/user", Some(auth_token), None).await
    }

    // ==========================================================================
    // STORAGE
    // ==========================================================================

    /// Uploads (or replaces) an object and returns the storage key.
    pub async fn upload_object(
        &self,
        bucket: &str,
        object_name: &str,
        data: Vec<u8>,
        content_type: &str,
        auth_token: Option<&str>,
    ) -> Result<String> {
        let path = format!("/storage/v1/object/{}/{}", bucket, object_name);

        let mut headers = HeaderMap::new();
        headers.insert("x-upsert", HeaderValue::from_static("true"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=3600"));

        let response = self.send(
            Method::POST,
            &path,
            auth_token,
            Some(Payload::Bytes { data, content_type: content_type.to_string() }),
            Some(headers),
        ).await?;

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let key = body
            .get("Key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/{}", bucket, object_name));

        if key.is_empty() {
            return Err(anyhow!("Storage upload returned an empty key"));
        }

        Ok(key)
    }

    pub fn public_object_url(&self, bucket: &str, object_name: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, object_name)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use profile_cell::{Profile, ProfileService};
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use statistics_cell::StatisticsService;

use crate::models::{login_error_message, AccountStatus, AuthError, LoginRequest, LoginResponse};

pub struct SessionService {
    supabase: SupabaseClient,
    profiles: ProfileService,
    statistics: StatisticsService,
}

impl SessionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            profiles: ProfileService::new(config),
            statistics: StatisticsService::new(config),
        }
    }

    fn email_confirmed(user: &Value) -> bool {
        user.get("email_confirmed_at")
            .map(|v| !v.is_null())
            .unwrap_or(false)
    }

    async fn end_session(&self, access_token: &str) {
        if let Err(e) = self.supabase.sign_out(access_token).await {
            warn!("Could not close rejected session: {}", e);
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        debug!("Login attempt for {}", request.email.trim());

        let session = self.supabase
            .sign_in_with_password(&request.email, &request.password)
            .await
            .map_err(|e| {
                let raw = SupabaseError::from_anyhow(&e)
                    .map(|err| err.message().to_string())
                    .unwrap_or_else(|| e.to_string());
                AuthError::InvalidCredentials(login_error_message(&raw))
            })?;

        let access_token = session
            .get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AuthError::ExternalService("Respuesta de sesión sin token".to_string()))?;
        let user = session.get("user").cloned().unwrap_or(Value::Null);
        let user_id = user
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AuthError::ExternalService("Respuesta de sesión sin usuario".to_string()))?;

        let profile = match self.profiles.find_profile(&user_id, &access_token).await? {
            Some(profile) => profile,
            None => {
                warn!("User {} signed in without a profile", user_id);
                self.end_session(&access_token).await;
                return Err(AuthError::ProfileMissing);
            }
        };

        let status = AccountStatus::evaluate(&profile, Self::email_confirmed(&user));
        if !status.is_active() {
            warn!("Login blocked for {}: {:?}", user_id, status);
            self.end_session(&access_token).await;
            return Err(AuthError::AccountBlocked(status));
        }

        if let Err(e) = self.statistics
            .record_access(&user_id, &profile.full_name(), profile.tipo, &access_token)
            .await
        {
            warn!("Access log not written for {}: {}", user_id, e);
        }

        info!("User {} logged in as {}", user_id, profile.tipo);
        Ok(LoginResponse {
            refresh_token: session.get("refresh_token").and_then(Value::as_str).map(str::to_string),
            expires_in: session.get("expires_in").and_then(Value::as_i64),
            landing: profile.tipo.landing().to_string(),
            access_token,
            profile,
        })
    }

    pub async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        self.supabase
            .sign_out(access_token)
            .await
            .map_err(|e| AuthError::ExternalService(e.to_string()))
    }

    /// Profile of the caller with the state of the account.
    pub async fn me(&self, user_id: &str, access_token: &str) -> Result<Value, AuthError> {
        let profile: Profile = self.profiles.get_profile(user_id, access_token).await?;

        let confirmed = match self.supabase.get_auth_user(access_token).await {
            Ok(user) => Self::email_confirmed(&user),
            Err(e) => {
                warn!("Could not load auth user {}: {}", user_id, e);
                false
            }
        };
        let status = AccountStatus::evaluate(&profile, confirmed);

        Ok(json!({
            "user_id": user_id,
            "email_confirmed": confirmed,
            "status": status,
            "landing": profile.tipo.landing(),
            "profile": profile,
        }))
    }
}

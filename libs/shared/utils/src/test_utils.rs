use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::role::Role;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing at a mock server.
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: Role::Patient,
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role,
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn specialist(email: &str) -> Self {
        Self::new(email, Role::Specialist)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Administrator)
    }

    /// Caller as the auth middleware would see it.
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some("authenticated".to_string()),
            metadata: Some(json!({ "tipo": self.role.as_str() })),
            created_at: Some(Utc::now()),
        }
    }

    /// `perfiles` row for this user, approved when it is a specialist.
    pub fn profile(&self) -> Value {
        let mut row = MockSupabaseResponses::profile_response(&self.id, &self.email, self.role);
        if self.role == Role::Specialist {
            row["aprobado"] = json!(true);
        }
        row
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "aud": "authenticated",
            "user_metadata": { "tipo": user.role.as_str() },
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn profile_response(user_id: &str, email: &str, role: Role) -> Value {
        let mut row = json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "nombre": "Ana",
            "apellido": "García",
            "edad": 35,
            "dni": "30123456",
            "email": email,
            "tipo": role.as_str(),
            "imagen_perfil": "https://example.com/perfil.png",
            "aprobado": false,
            "rechazado": false,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        });

        match role {
            Role::Patient => {
                row["obra_social"] = json!("OSDE");
                row["imagen_perfil2"] = json!("https://example.com/perfil2.png");
            }
            Role::Specialist => {
                row["especialidad"] = json!("cardiologia, clinica");
            }
            Role::Administrator => {}
        }

        row
    }

    pub fn session_response(user_id: &str, email: &str, confirmed: bool) -> Value {
        json!({
            "access_token": "access-token",
            "refresh_token": "refresh-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": {
                "id": user_id,
                "email": email,
                "email_confirmed_at": if confirmed { json!("2024-01-01T00:00:00Z") } else { Value::Null }
            }
        })
    }

    pub fn appointment_response(
        id: &str,
        patient_id: &str,
        specialist_id: &str,
        fecha: &str,
        estado: &str,
    ) -> Value {
        json!({
            "id": id,
            "pacienteid": patient_id,
            "pacientenombre": "Ana García",
            "especialistaid": specialist_id,
            "especialistanombre": "Luis Pérez",
            "especialidad": "cardiologia",
            "fecha": fecha,
            "estado": estado,
            "comentariopaciente": null,
            "comentarioespecialista": null,
            "resena": null,
            "encuestacompletada": false,
            "calificacionatencion": null
        })
    }

    pub fn availability_response(specialist_id: &str, specialty: &str, day: &str, start: &str, end: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "especialista_id": specialist_id,
            "especialidad": specialty,
            "dia": day,
            "hora_inicio": start,
            "hora_fin": end
        })
    }

    pub fn clinical_record_response(patient_id: &str, specialist_id: &str, appointment_id: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "paciente_id": patient_id,
            "especialista_id": specialist_id,
            "turno_id": appointment_id,
            "fecha_atencion": "2024-01-15T10:00:00Z",
            "altura": 1.7,
            "peso": 70.5,
            "temperatura": 36.6,
            "presion": "120/80",
            "datos_dinamicos": [{ "clave": "caries", "valor": "4" }],
            "created_at": "2024-01-15T10:30:00Z",
            "updated_at": "2024-01-15T10:30:00Z"
        })
    }

    pub fn specialty_response(name: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "nombre": name,
            "descripcion": null,
            "imagen_url": null,
            "activa": true
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert_eq!(app_config.booking_horizon_days, 15);
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::specialist("doc@example.com");
        assert_eq!(user.email, "doc@example.com");
        assert_eq!(user.role, Role::Specialist);

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.id, user.id);
        assert_eq!(user.profile()["aprobado"], true);
        assert_eq!(user.profile()["tipo"], "especialista");
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}

use assert_matches::assert_matches;
use reqwest::Method;
use serde_json::{json, Value};
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_json, header, method, path, query_param};

use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: "secret".to_string(),
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn request_sends_api_key_and_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/perfiles"))
        .and(query_param("dni", "eq.12345678"))
        .and(header("apikey", "test-anon-key"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "dni": "12345678" }])))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config_for(&server));
    let rows: Vec<Value> = client
        .request(Method::GET, "/rest/v1/perfiles?dni=eq.12345678", Some("user-token"), None)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn sign_in_lowercases_email_and_classifies_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(body_json(json!({ "email": "ana@clinica.com", "password": "Secreta123" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config_for(&server));
    let err = client
        .sign_in_with_password("Ana@Clinica.com", "Secreta123")
        .await
        .unwrap_err();

    let classified = SupabaseError::from_anyhow(&err).unwrap();
    assert_matches!(classified, SupabaseError::Api { status: 400, .. });
    assert_eq!(classified.message(), "Invalid login credentials");
}

#[tokio::test]
async fn upload_object_upserts_and_returns_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/storage/v1/object/perfiles/u1_1700000000000.png"))
        .and(header("x-upsert", "true"))
        .and(header("content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Key": "perfiles/u1_1700000000000.png"
        })))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config_for(&server));
    let key = client
        .upload_object("perfiles", "u1_1700000000000.png", vec![1, 2, 3], "image/png", None)
        .await
        .unwrap();

    assert_eq!(key, "perfiles/u1_1700000000000.png");
}

#[tokio::test]
async fn duplicate_insert_is_a_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/perfiles"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"perfiles_dni_key\""
        })))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config_for(&server));
    let err = client
        .request::<Vec<Value>>(Method::POST, "/rest/v1/perfiles", None, Some(json!({ "dni": "1" })))
        .await
        .unwrap_err();

    assert_matches!(SupabaseError::from_anyhow(&err), Some(SupabaseError::Conflict(_)));
}

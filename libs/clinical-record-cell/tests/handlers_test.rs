use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};

use clinical_record_cell::router::clinical_record_routes;
use shared_models::role::Role;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockSupabaseResponses};

struct TestContext {
    server: MockServer,
    app: Router,
    config: TestConfig,
}

impl TestContext {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let config = TestConfig::with_url(&server.uri());
        let app = clinical_record_routes(config.to_arc());
        Self { server, app, config }
    }

    fn token_for(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
    }

    async fn mount_profile(&self, user: &TestUser) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/perfiles"))
            .and(query_param("user_id", format!("eq.{}", user.id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([user.profile()])))
            .mount(&self.server)
            .await;
    }

    async fn mount_appointment(&self, appointment: Value) {
        let id = appointment["id"].as_str().unwrap().to_string();
        Mock::given(method("GET"))
            .and(path("/rest/v1/turnos"))
            .and(query_param("id", format!("eq.{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
            .mount(&self.server)
            .await;
    }

    async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Option<String>, Bytes) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, body)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = self.send_raw(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }
}

fn json_request(http_method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(http_method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn vitals(extra: Value) -> Value {
    let mut body = json!({
        "altura": 1.7,
        "peso": 70.5,
        "temperatura": 36.6,
        "presion": "120/80",
        "datos_dinamicos": [{ "clave": "caries", "valor": "4" }]
    });
    if let (Some(target), Some(source)) = (body.as_object_mut(), extra.as_object()) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
    body
}

async fn mount_patient_records(ctx: &TestContext, patient_id: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/historias_clinicas"))
        .and(query_param("paciente_id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinical_record_response(patient_id, "spec-1", "t1")
        ])))
        .mount(&ctx.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/perfiles"))
        .and(query_param("user_id", "in.(spec-1)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::profile_response("spec-1", "luis@clinica.com", Role::Specialist)
        ])))
        .mount(&ctx.server)
        .await;
}

#[tokio::test]
async fn recording_history_completes_the_appointment() {
    let ctx = TestContext::new().await;
    let specialist = TestUser::specialist("luis@clinica.com");
    ctx.mount_profile(&specialist).await;
    ctx.mount_appointment(MockSupabaseResponses::appointment_response(
        "t1", "patient-1", &specialist.id, "2024-01-15T10:00:00", "aceptado",
    ))
    .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/historias_clinicas"))
        .and(query_param("turno_id", "eq.t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&ctx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/historias_clinicas"))
        .and(body_partial_json(json!({
            "turno_id": "t1",
            "paciente_id": "patient-1",
            "presion": "120/80"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::clinical_record_response("patient-1", &specialist.id, "t1")
        ])))
        .expect(1)
        .mount(&ctx.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/turnos"))
        .and(query_param("id", "eq.t1"))
        .and(body_partial_json(json!({
            "estado": "realizado",
            "resena": "Historia clínica registrada"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response("t1", "patient-1", &specialist.id, "2024-01-15T10:00:00", "realizado")
        ])))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let request = json_request(
        "POST",
        "/appointments/t1",
        &ctx.token_for(&specialist),
        vitals(json!({ "presion": " 120/80 " })),
    );
    let (status, body) = ctx.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["historia"]["turno_id"], "t1");
}

#[tokio::test]
async fn failed_completion_removes_the_new_record() {
    let ctx = TestContext::new().await;
    let specialist = TestUser::specialist("luis@clinica.com");
    ctx.mount_profile(&specialist).await;
    ctx.mount_appointment(MockSupabaseResponses::appointment_response(
        "t1", "patient-1", &specialist.id, "2024-01-15T10:00:00", "aceptado",
    ))
    .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/historias_clinicas"))
        .and(query_param("turno_id", "eq.t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&ctx.server)
        .await;

    let mut created = MockSupabaseResponses::clinical_record_response("patient-1", &specialist.id, "t1");
    created["id"] = json!("h1");
    Mock::given(method("POST"))
        .and(path("/rest/v1/historias_clinicas"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([created])))
        .expect(1)
        .mount(&ctx.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/turnos"))
        .respond_with(ResponseTemplate::new(500).set_body_json(MockSupabaseResponses::error_response("boom", "XX000")))
        .expect(1)
        .mount(&ctx.server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/historias_clinicas"))
        .and(query_param("id", "eq.h1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let request = json_request("POST", "/appointments/t1", &ctx.token_for(&specialist), vitals(json!({})));
    let (status, _) = ctx.send(request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn documented_appointment_cannot_get_a_second_record() {
    let ctx = TestContext::new().await;
    let specialist = TestUser::specialist("luis@clinica.com");
    ctx.mount_profile(&specialist).await;
    ctx.mount_appointment(MockSupabaseResponses::appointment_response(
        "t1", "patient-1", &specialist.id, "2024-01-15T10:00:00", "aceptado",
    ))
    .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/historias_clinicas"))
        .and(query_param("turno_id", "eq.t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "h1", "turno_id": "t1" }])))
        .mount(&ctx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/historias_clinicas"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&ctx.server)
        .await;

    let request = json_request("POST", "/appointments/t1", &ctx.token_for(&specialist), vitals(json!({})));
    let (status, body) = ctx.send(request).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "El turno ya tiene una historia clínica");
}

#[tokio::test]
async fn pending_appointment_cannot_be_documented() {
    let ctx = TestContext::new().await;
    let specialist = TestUser::specialist("luis@clinica.com");
    ctx.mount_profile(&specialist).await;
    ctx.mount_appointment(MockSupabaseResponses::appointment_response(
        "t1", "patient-1", &specialist.id, "2024-01-15T10:00:00", "pendiente",
    ))
    .await;

    let request = json_request("POST", "/appointments/t1", &ctx.token_for(&specialist), vitals(json!({})));
    let (status, _) = ctx.send(request).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn more_than_three_dynamic_fields_is_rejected() {
    let ctx = TestContext::new().await;
    let specialist = TestUser::specialist("luis@clinica.com");
    ctx.mount_profile(&specialist).await;
    ctx.mount_appointment(MockSupabaseResponses::appointment_response(
        "t1", "patient-1", &specialist.id, "2024-01-15T10:00:00", "aceptado",
    ))
    .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/historias_clinicas"))
        .and(query_param("turno_id", "eq.t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&ctx.server)
        .await;

    let fields = json!([
        { "clave": "a", "valor": "1" },
        { "clave": "b", "valor": "2" },
        { "clave": "c", "valor": "3" },
        { "clave": "d", "valor": "4" }
    ]);
    let request = json_request(
        "POST",
        "/appointments/t1",
        &ctx.token_for(&specialist),
        vitals(json!({ "datos_dinamicos": fields })),
    );
    let (status, _) = ctx.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patient_reads_own_history_with_specialists() {
    let ctx = TestContext::new().await;
    let patient = TestUser::patient("ana@clinica.com");
    ctx.mount_profile(&patient).await;
    mount_patient_records(&ctx, &patient.id).await;

    let (status, body) = ctx
        .send(get_request(&format!("/patients/{}", patient.id), &ctx.token_for(&patient)))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["records"][0]["historia"]["presion"], "120/80");
    assert_eq!(body["records"][0]["especialista"]["user_id"], "spec-1");
}

#[tokio::test]
async fn other_patients_cannot_read_a_history() {
    let ctx = TestContext::new().await;
    let stranger = TestUser::patient("otra@clinica.com");
    ctx.mount_profile(&stranger).await;
    mount_patient_records(&ctx, "patient-1").await;

    let (status, _) = ctx
        .send(get_request("/patients/patient-1", &ctx.token_for(&stranger)))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn history_exports_as_pdf() {
    let ctx = TestContext::new().await;
    let patient = TestUser::patient("ana@clinica.com");
    ctx.mount_profile(&patient).await;
    mount_patient_records(&ctx, &patient.id).await;

    let (status, content_type, body) = ctx
        .send_raw(get_request(&format!("/patients/{}/pdf", patient.id), &ctx.token_for(&patient)))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/pdf"));
    assert!(body.starts_with(b"%PDF"));
}

#[tokio::test]
async fn only_administrators_delete_records() {
    let ctx = TestContext::new().await;
    let specialist = TestUser::specialist("luis@clinica.com");
    ctx.mount_profile(&specialist).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/h-1")
        .header("authorization", format!("Bearer {}", ctx.token_for(&specialist)))
        .body(Body::empty())
        .unwrap();
    let (status, _) = ctx.send(request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};

use chrono::{NaiveDate, SecondsFormat};
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockSupabaseResponses};
use statistics_cell::router::statistics_routes;
use statistics_cell::services::aggregate::local_day_start;

struct TestContext {
    server: MockServer,
    app: Router,
    config: TestConfig,
}

impl TestContext {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let config = TestConfig::with_url(&server.uri());
        let app = statistics_routes(config.to_arc());
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

    async fn mount_appointments(&self, rows: Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/turnos"))
            .and(query_param("order", "fecha.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&self.server)
            .await;
    }

    async fn send_raw(&self, uri: &str, user: &TestUser) -> (StatusCode, Option<String>, Bytes) {
        let request = Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {}", self.token_for(user)))
            .body(Body::empty())
            .unwrap();
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

    async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        let (status, _, body) = self.send_raw(uri, user).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }
}

fn january_appointments() -> Value {
    json!([
        MockSupabaseResponses::appointment_response("t1", "patient-1", "spec-1", "2024-01-15T10:00:00", "realizado"),
        MockSupabaseResponses::appointment_response("t2", "patient-2", "spec-1", "2024-01-16T11:00:00", "cancelado"),
    ])
}

#[tokio::test]
async fn admin_reads_appointment_statistics() {
    let ctx = TestContext::new().await;
    let admin = TestUser::admin("admin@clinica.com");
    ctx.mount_profile(&admin).await;
    ctx.mount_appointments(january_appointments()).await;

    let (status, body) = ctx
        .get("/appointments?from=2024-01-01&to=2024-01-31", &admin)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["by_specialty"][0]["nombre"], "cardiologia");
    assert_eq!(body["by_specialty"][0]["porcentaje"], 100.0);
    assert_eq!(body["by_day"][0]["fecha"], "15/01/2024");
    assert_eq!(body["completed_by_specialist"][0]["cantidad"], 1);
    assert_eq!(body["summary"]["tasa_cancelacion"], 50.0);
}

#[tokio::test]
async fn inverted_range_is_a_bad_request() {
    let ctx = TestContext::new().await;
    let admin = TestUser::admin("admin@clinica.com");
    ctx.mount_profile(&admin).await;

    let (status, _) = ctx
        .get("/appointments?desde=2024-02-01&hasta=2024-01-01", &admin)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn specialists_cannot_read_statistics() {
    let ctx = TestContext::new().await;
    let specialist = TestUser::specialist("luis@clinica.com");
    ctx.mount_profile(&specialist).await;

    let (status, _) = ctx.get("/logs", &specialist).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_lists_access_logs() {
    let ctx = TestContext::new().await;
    let admin = TestUser::admin("admin@clinica.com");
    ctx.mount_profile(&admin).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/logs_ingresos"))
        .and(query_param("order", "fecha_hora.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 2,
                "usuario_id": "patient-1",
                "usuario_nombre": "Ana García",
                "usuario_tipo": "paciente",
                "fecha_hora": "2024-01-15T10:00:00"
            },
            {
                "id": 1,
                "usuario_id": admin.id.as_str(),
                "usuario_nombre": "Admin",
                "usuario_tipo": "administrador",
                "fecha_hora": "2024-01-14T08:00:00"
            }
        ])))
        .mount(&ctx.server)
        .await;

    let (status, body) = ctx.get("/logs", &admin).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["logs"][0]["usuario_tipo"], "paciente");
}

#[tokio::test]
async fn log_range_is_bounded_on_local_days_in_utc() {
    let ctx = TestContext::new().await;
    let admin = TestUser::admin("admin@clinica.com");
    ctx.mount_profile(&admin).await;

    let utc = |y: i32, m: u32, d: u32| {
        local_day_start(NaiveDate::from_ymd_opt(y, m, d).unwrap()).to_rfc3339_opts(SecondsFormat::Secs, true)
    };

    Mock::given(method("GET"))
        .and(path("/rest/v1/logs_ingresos"))
        .and(query_param("fecha_hora", format!("gte.{}", utc(2024, 1, 10))))
        .and(query_param("fecha_hora", format!("lt.{}", utc(2024, 1, 16))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let (status, body) = ctx.get("/logs?from=2024-01-10&to=2024-01-15", &admin).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn appointments_export_as_csv() {
    let ctx = TestContext::new().await;
    let admin = TestUser::admin("admin@clinica.com");
    ctx.mount_profile(&admin).await;
    ctx.mount_appointments(january_appointments()).await;

    let (status, content_type, body) = ctx.send_raw("/export/appointments.csv", &admin).await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap_or_default().starts_with("text/csv"));
    let text = String::from_utf8(body.to_vec()).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("Fecha,Hora,Paciente,Especialista,Especialidad,Estado,Reseña,Calificación,Comentario")
    );
    assert!(lines.next().unwrap().starts_with("15/01/2024,10:00,"));
}

#[tokio::test]
async fn statistics_export_has_sections() {
    let ctx = TestContext::new().await;
    let admin = TestUser::admin("admin@clinica.com");
    ctx.mount_profile(&admin).await;
    ctx.mount_appointments(january_appointments()).await;

    let (status, _, body) = ctx
        .send_raw("/export/statistics.csv?from=2024-01-01&to=2024-01-31", &admin)
        .await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("Por Especialidad"));
    assert!(text.contains("Luis Pérez,2,100.0%"));
    assert!(text.contains("Resumen General"));
}

#[tokio::test]
async fn statistics_report_downloads_as_pdf() {
    let ctx = TestContext::new().await;
    let admin = TestUser::admin("admin@clinica.com");
    ctx.mount_profile(&admin).await;
    ctx.mount_appointments(january_appointments()).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/logs_ingresos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "usuario_id": "patient-1",
                "usuario_nombre": "Ana García",
                "usuario_tipo": "paciente",
                "fecha_hora": "2024-01-15T10:00:00Z"
            }
        ])))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let (status, content_type, body) = ctx
        .send_raw("/export/statistics.pdf?from=2024-01-01&to=2024-01-31", &admin)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/pdf"));
    assert!(body.starts_with(b"%PDF"));
}

#[tokio::test]
async fn specialists_cannot_download_the_report() {
    let ctx = TestContext::new().await;
    let specialist = TestUser::specialist("luis@clinica.com");
    ctx.mount_profile(&specialist).await;

    let (status, _, _) = ctx.send_raw("/export/statistics.pdf", &specialist).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

//! Router-level tests that never reach the database.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use clinic_api::config::AppConfig;
use clinic_api::AppState;
use clinic_shared::types::auth::{Claims, UserRole};

const SECRET: &str = "http-test-secret";

fn app() -> Router {
    // Nothing listens here; handlers that reach the pool fail fast.
    let manager = ConnectionManager::<PgConnection>::new("postgres://nobody@127.0.0.1:1/none");
    let db = Pool::builder()
        .max_size(1)
        .min_idle(Some(0))
        .connection_timeout(Duration::from_millis(200))
        .build_unchecked(manager);

    let config = AppConfig {
        jwt_secret: SECRET.to_string(),
        ..AppConfig::default()
    };

    clinic_api::router(Arc::new(AppState { db, config, metrics_handle: None }))
}

fn bearer(role: UserRole, ttl: i64) -> String {
    let claims = Claims::new(Uuid::new_v4(), role, ttl);
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
    format!("Bearer {token}")
}

async fn send(method: &str, path: &str, auth: Option<String>, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let mut req = Request::builder().method(method).uri(path);
    if let Some(value) = auth {
        req = req.header("Authorization", value);
    }
    let req = match body {
        Some(json) => req
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    for (method, path) in [
        ("GET", "/api/v1/user/getUserData"),
        ("POST", "/api/v1/user/getUserData"),
        ("GET", "/api/v1/user/getAllDoctors"),
        ("GET", "/api/v1/doctor/getDoctors"),
        ("GET", "/api/v1/medical-records/00000000-0000-0000-0000-000000000000"),
        ("GET", "/api/v1/admin/getAllUsers"),
    ] {
        let (status, body) = send(method, path, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {path}");
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "E0004");
    }
}

#[tokio::test]
async fn expired_token_is_reported_as_such() {
    let (status, body) = send("GET", "/api/v1/user/getUserData", Some(bearer(UserRole::Patient, -60)), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "E1004");
}

#[tokio::test]
async fn doctor_routes_refuse_patients() {
    let (status, body) = send("GET", "/api/v1/doctor/auth", Some(bearer(UserRole::Patient, 3600)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "E2004");
}

#[tokio::test]
async fn admin_routes_refuse_doctors() {
    let (status, body) = send("GET", "/api/v1/admin/getAllDoctors", Some(bearer(UserRole::Doctor, 3600)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn malformed_booking_date_is_a_validation_error() {
    let body = serde_json::json!({
        "doctorId": Uuid::new_v4(),
        "date": "June 1st",
        "time": "10:00"
    });
    let (status, json) = send("POST", "/api/v1/user/book-appointment", Some(bearer(UserRole::Patient, 3600)), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "E0002");
}

#[tokio::test]
async fn unknown_status_is_a_validation_error() {
    let body = serde_json::json!({ "appointmentId": Uuid::new_v4(), "status": "cancelled" });
    let (status, json) = send("POST", "/api/v1/doctor/update-status", Some(bearer(UserRole::Doctor, 3600)), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "E0002");
}

#[tokio::test]
async fn weak_password_is_refused_before_storage() {
    let body = serde_json::json!({
        "name": "Pat",
        "email": "pat@clinic.test",
        "password": "short",
        "rollNumber": "R-1"
    });
    let (status, json) = send("POST", "/api/v1/user/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "E1006");
}

#[tokio::test]
async fn health_reports_an_unreachable_database() {
    let (status, body) = send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["service"], "clinic-api");
}

#[tokio::test]
async fn database_outage_surfaces_as_internal_error() {
    let (status, body) = send("GET", "/api/v1/user/getUserData", Some(bearer(UserRole::Patient, 3600)), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "internal server error");
}

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::router::{appointment_routes, audit_routes};
use appointment_cell::state::SchedulingState;
use appointment_cell::store::MemorySchedulingStore;
use shared_database::directory::MemoryDirectory;
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{ClinicFixture, JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    appointments: Router,
    audit: Router,
    fixture: ClinicFixture,
    config: TestConfig,
}

impl TestApp {
    async fn new() -> Self {
        let config = TestConfig::default();
        let directory = Arc::new(MemoryDirectory::new());
        let fixture = ClinicFixture::seed(&directory).await;
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 10, 13, 12, 0, 0).unwrap()));

        let state = Arc::new(SchedulingState::new(
            config.to_arc(),
            Arc::new(MemorySchedulingStore::new()),
            directory,
            clock,
        ));

        Self {
            appointments: appointment_routes(state.clone()),
            audit: audit_routes(state),
            fixture,
            config,
        }
    }

    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, None)
    }

    async fn send(&self, router: &Router, method: &str, uri: &str, user: Option<&TestUser>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("Authorization", format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn call(&self, method: &str, uri: &str, user: &TestUser, body: Option<Value>) -> (StatusCode, Value) {
        self.send(&self.appointments, method, uri, Some(user), body).await
    }

    async fn book(&self, scheduled_at: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/",
                &self.fixture.secretary,
                Some(json!({
                    "doctor_id": self.fixture.doctor.id,
                    "patient_id": self.fixture.patient_id,
                    "clinic_id": self.fixture.clinic.id,
                    "scheduled_at": scheduled_at
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["appointment"]["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_unauthorized() {
    let app = TestApp::new().await;

    let (status, body) = app.send(&app.appointments, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("authorization"));

    let request = Request::builder()
        .uri("/")
        .header("Authorization", format!("Bearer {}", JwtTestUtils::create_expired_token(&app.fixture.doctor, &app.config.jwt_secret)))
        .body(Body::empty())
        .unwrap();
    let response = app.appointments.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_user_is_forbidden() {
    let app = TestApp::new().await;
    let stranger = TestUser::doctor("stranger@nowhere.test");

    let (status, _) = app.call("GET", "/", &stranger, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_and_fetch_appointment() {
    let app = TestApp::new().await;
    let id = app.book("2025-10-15T14:30:00").await;

    let (status, body) = app.call("GET", &format!("/{}", id), &app.fixture.patient, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["scheduled_at"], "2025-10-15T17:30:00Z");
    assert_eq!(body["payment"]["status"], "PENDING");
    assert_eq!(body["doctor"]["full_name"], "Dra. Lima");
    assert_eq!(body["doctor"]["specialty"], "CARDIOLOGY");
    assert_eq!(body["patient"]["full_name"], "Joao Silva");
    assert_eq!(body["clinic"]["trade_name"], "Clinica Vida");
}

#[tokio::test]
async fn test_double_booking_returns_conflict() {
    let app = TestApp::new().await;
    app.book("2025-10-15T14:30:00").await;

    let (status, body) = app
        .call(
            "POST",
            "/",
            &app.fixture.secretary,
            Some(json!({
                "doctor_id": app.fixture.doctor.id,
                "patient_id": app.fixture.other_patient_id,
                "clinic_id": app.fixture.clinic.id,
                "scheduled_at": "2025-10-15T14:30:00"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("doctor"));
}

#[tokio::test]
async fn test_transition_errors_map_to_status_codes() {
    let app = TestApp::new().await;
    let id = app.book("2025-10-15T14:30:00").await;

    // Patients cannot confirm
    let (status, _) = app.call("PATCH", &format!("/{}/confirm", id), &app.fixture.patient, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Other clinic's staff do not see it
    let (status, _) = app
        .call("PATCH", &format!("/{}/confirm", id), &app.fixture.other_secretary, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call("PATCH", &format!("/{}/confirm", id), &app.fixture.secretary, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "CONFIRMED");

    // Confirm is only valid from PENDING
    let (status, _) = app.call("PATCH", &format!("/{}/confirm", id), &app.fixture.secretary, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            "PUT",
            &format!("/{}/status", id),
            &app.fixture.secretary,
            Some(json!({ "status": "CANCELADA" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "CANCELLED");
    assert_eq!(body["changed"], true);
}

#[tokio::test]
async fn test_cancel_accepts_missing_body() {
    let app = TestApp::new().await;
    let id = app.book("2025-10-15T14:30:00").await;

    let (status, body) = app.call("PATCH", &format!("/{}/cancel", id), &app.fixture.secretary, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "CANCELLED");

    let (status, body) = app
        .send(&app.audit, "GET", "/status-logs?action=CANCELLED", Some(&app.fixture.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["logs"][0]["reason"], "Cancelled by clinic staff");
}

#[tokio::test]
async fn test_patient_self_service_routes() {
    let app = TestApp::new().await;
    let id = app.book("2025-10-20T10:00:00").await;

    let (status, body) = app
        .call(
            "PATCH",
            &format!("/me/{}/reschedule", id),
            &app.fixture.patient,
            Some(json!({ "scheduled_at": "2025-10-21T11:00:00" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["patient_reschedule_count"], 1);

    // Staff must use the staff route
    let (status, _) = app.call("PATCH", &format!("/me/{}/cancel", id), &app.fixture.secretary, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call("PATCH", &format!("/me/{}/cancel", id), &app.fixture.patient, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "CANCELLED");
}

#[tokio::test]
async fn test_mark_paid_twice_reports_already_processed() {
    let app = TestApp::new().await;
    let id = app.book("2025-10-15T14:30:00").await;
    let uri = format!("/{}/payment", id);

    let (status, body) = app.call("PUT", &uri, &app.fixture.secretary, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment"]["status"], "PAID");
    assert_eq!(body["message"], "Payment registered");

    let (status, body) = app.call("PUT", &uri, &app.fixture.secretary, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Payment already processed");
}

#[tokio::test]
async fn test_annotation_create_then_update() {
    let app = TestApp::new().await;
    let id = app.book("2025-10-15T14:30:00").await;
    let uri = format!("/{}/annotation", id);

    let (status, _) = app
        .call("POST", &uri, &app.fixture.doctor, Some(json!({ "content": "Anamnese" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .call("POST", &uri, &app.fixture.doctor, Some(json!({ "content": "Anamnese revisada" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.call("GET", &uri, &app.fixture.secretary, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Anamnese revisada");

    let (status, _) = app.call("GET", &uri, &app.fixture.patient, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_history_survives_delete() {
    let app = TestApp::new().await;
    let id = app.book("2025-10-15T14:30:00").await;

    let (status, _) = app.call("DELETE", &format!("/{}", id), &app.fixture.secretary, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("GET", &format!("/{}", id), &app.fixture.secretary, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call("GET", &format!("/{}/history", id), &app.fixture.clinic_admin, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = body["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["CREATED", "DELETED"]);
}

#[tokio::test]
async fn test_agenda_and_dashboard_routes() {
    let app = TestApp::new().await;
    app.book("2025-10-13T15:00:00").await;
    app.book("2025-10-15T14:30:00").await;

    let (status, body) = app.call("GET", "/agenda?year=2025&month=10", &app.fixture.doctor, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"].as_array().unwrap().len(), 2);
    assert_eq!(body["days"][1]["appointments"][0]["time"], "14:30");

    let (status, body) = app.call("GET", "/dashboard", &app.fixture.secretary, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["today_total"], 1);
    assert_eq!(body["month_total"], 2);

    let (status, _) = app.call("GET", "/agenda?year=2025&month=13", &app.fixture.doctor, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_conflict_check_route() {
    let app = TestApp::new().await;
    app.book("2025-10-15T14:30:00").await;

    let uri = format!(
        "/conflicts/check?doctor_id={}&patient_id={}&scheduled_at=2025-10-15T14:30:00",
        app.fixture.doctor.id, app.fixture.other_patient_id
    );
    let (status, body) = app.call("GET", &uri, &app.fixture.secretary, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_conflict"], true);
    assert_eq!(body["doctor_conflicts"].as_array().unwrap().len(), 1);
    assert!(body["patient_conflicts"].as_array().unwrap().is_empty());
}

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use caltrack_core::config::{BootstrapAdmin, CaltrackConfig};
use caltrack_core::FixedClock;
use caltrack_gateway::app::{build_router, AppState};
use caltrack_notify::{EmailMessage, Notifier};
use caltrack_registry::{NewDepartment, NewInstrument, Registry};
use caltrack_reminders::Dispatcher;
use caltrack_sessions::SessionManager;
use caltrack_users::{NewUser, UserManager};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, msg: &EmailMessage) -> bool {
        self.sent.lock().unwrap().push(msg.clone());
        true
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct Harness {
    router: Router,
    registry: Arc<Registry>,
    notifier: Arc<RecordingNotifier>,
}

fn harness() -> Harness {
    harness_with(CaltrackConfig::default())
}

fn harness_with(config: CaltrackConfig) -> Harness {
    let clock = Arc::new(FixedClock::on(d(2024, 3, 20)));
    let registry = Arc::new(Registry::open_in_memory().unwrap());
    let users = UserManager::new(Connection::open_in_memory().unwrap()).unwrap();
    let sessions = SessionManager::new(Connection::open_in_memory().unwrap()).unwrap();

    users.ensure_bootstrap_admin(&BootstrapAdmin::default()).unwrap();
    users
        .register(&NewUser {
            username: "tech".to_string(),
            email: "tech@company.com".to_string(),
            password: "bench-pass-1".to_string(),
            department: None,
        })
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        notifier.clone(),
        clock.clone(),
    ));
    let state = Arc::new(AppState::new(
        config,
        registry.clone(),
        users,
        sessions,
        dispatcher,
        clock,
    ));
    Harness {
        router: build_router(state),
        registry,
        notifier,
    }
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(router: &Router, username: &str, password: &str) -> String {
    let (status, body) = call(
        router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let h = harness();
    let (status, body) = call(&h.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["today"], "2024-03-20");
}

#[tokio::test]
async fn api_requires_a_session() {
    let h = harness();
    let (status, body) = call(&h.router, Method::GET, "/api/dashboard", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = call(&h.router, Method::GET, "/api/dashboard", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_are_rejected() {
    let h = harness();
    let (status, _) = call(
        &h.router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "admin", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_sets_cookie_usable_for_later_requests() {
    let h = harness();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "username": "tech", "password": "bench-pass-1" }).to_string(),
        ))
        .unwrap();
    let resp = h.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("caltrack_session="));
    assert!(cookie.contains("HttpOnly"));

    let pair = cookie.split(';').next().unwrap().to_string();
    let req = Request::builder()
        .uri("/api/dashboard")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let resp = h.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn session_expiry_follows_the_server_clock() {
    let h = harness();
    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "tech", "password": "bench-pass-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // noon on the fixed date plus the default 12 hour ttl
    assert_eq!(body["expires_at"], "2024-03-21T00:00:00Z");
}

#[tokio::test]
async fn oversized_session_ttl_fails_login_without_crashing() {
    let mut config = CaltrackConfig::default();
    config.auth.session_ttl_hours = 1_000_000_000_000;
    let h = harness_with(config);
    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "tech", "password": "bench-pass-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "CONFIG_ERROR");
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let h = harness();
    let token = login(&h.router, "tech", "bench-pass-1").await;
    let (status, _) = call(&h.router, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&h.router, Method::GET, "/api/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_conflicts_on_duplicate_username() {
    let h = harness();
    let form = json!({
        "username": "newbie",
        "email": "newbie@company.com",
        "password": "long-enough",
    });
    let (status, body) = call(&h.router, Method::POST, "/api/auth/register", None, Some(form.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "user");

    let (status, _) = call(&h.router, Method::POST, "/api/auth/register", None, Some(form)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn non_admin_cannot_manage_departments_or_send_reminders() {
    let h = harness();
    let token = login(&h.router, "tech", "bench-pass-1").await;

    let (status, body) = call(&h.router, Method::GET, "/api/departments", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = call(&h.router, Method::POST, "/api/reminders/send", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(h.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn instrument_lifecycle() {
    let h = harness();
    let token = login(&h.router, "tech", "bench-pass-1").await;

    let (status, created) = call(
        &h.router,
        Method::POST,
        "/api/instruments",
        Some(&token),
        Some(json!({
            "name": "Torque Wrench",
            "manufacturer": "Snap-on",
            "last_calibration_date": "2024-01-01",
            "calibration_frequency": 365,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    let (status, shown) = call(&h.router, Method::GET, &format!("/api/instruments/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shown["name"], "Torque Wrench");
    assert_eq!(shown["status"], "active");

    let (status, calibrated) = call(
        &h.router,
        Method::POST,
        &format!("/api/instruments/{id}/calibrate"),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(calibrated["last_calibration_date"], "2024-03-20");

    let (status, _) = call(&h.router, Method::DELETE, &format!("/api/instruments/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&h.router, Method::GET, &format!("/api/instruments/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn invalid_instrument_is_a_bad_request() {
    let h = harness();
    let token = login(&h.router, "tech", "bench-pass-1").await;
    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/instruments",
        Some(&token),
        Some(json!({
            "name": "   ",
            "last_calibration_date": "2024-01-01",
            "calibration_frequency": 30,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn completing_repair_reactivates_instrument() {
    let h = harness();
    let token = login(&h.router, "tech", "bench-pass-1").await;
    let inst = h
        .registry
        .create_instrument(&NewInstrument {
            name: "Caliper".to_string(),
            last_calibration_date: d(2024, 2, 1),
            calibration_frequency: 180,
            ..NewInstrument::default()
        })
        .unwrap();

    let (status, _) = call(
        &h.router,
        Method::PUT,
        &format!("/api/instruments/{}/status", inst.id),
        Some(&token),
        Some(json!({ "status": "repair" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, repair) = call(
        &h.router,
        Method::POST,
        "/api/repairs",
        Some(&token),
        Some(json!({
            "instrument_id": inst.id,
            "description": "jaw misaligned",
            "technician": "R. Ortiz",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(repair["status"], "in_progress");
    assert_eq!(repair["start_date"], "2024-03-20");
    let repair_id = repair["id"].as_i64().unwrap();

    let (status, done) = call(
        &h.router,
        Method::POST,
        &format!("/api/repairs/{repair_id}/complete"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "completed");
    assert_eq!(done["completion_date"], "2024-03-20");

    let inst = h.registry.get_instrument(inst.id).unwrap().unwrap();
    assert_eq!(inst.status.to_string(), "active");

    let (status, listing) = call(&h.router, Method::GET, "/api/repairs?search=caliper", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing.as_array().unwrap().len(), 1);
    assert_eq!(listing[0]["instrument_name"], "Caliper");
}

#[tokio::test]
async fn deleting_department_reports_unassigned_instruments() {
    let h = harness();
    let token = login(&h.router, "admin", "change-me-now").await;

    let (status, dept) = call(
        &h.router,
        Method::POST,
        "/api/departments",
        Some(&token),
        Some(json!({ "name": "Metrology", "manager_email": "m@company.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let dept_id = dept["id"].as_i64().unwrap();

    for name in ["Gauge A", "Gauge B"] {
        h.registry
            .create_instrument(&NewInstrument {
                name: name.to_string(),
                department_id: Some(dept_id),
                last_calibration_date: d(2024, 1, 1),
                calibration_frequency: 90,
                ..NewInstrument::default()
            })
            .unwrap();
    }

    let (status, body) = call(&h.router, Method::DELETE, &format!("/api/departments/{dept_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unassigned_instruments"], 2);

    let instruments = h.registry.list_instruments().unwrap();
    assert_eq!(instruments.len(), 2);
    assert!(instruments.iter().all(|i| i.department_id.is_none()));
}

#[tokio::test]
async fn admin_sends_due_reminders() {
    let h = harness();
    let dept = h
        .registry
        .create_department(&NewDepartment {
            name: "QA".to_string(),
            manager_email: Some("qa@company.com".to_string()),
            description: None,
        })
        .unwrap();
    // due 2024-03-31: upcoming
    h.registry
        .create_instrument(&NewInstrument {
            name: "Multimeter".to_string(),
            department_id: Some(dept.id),
            last_calibration_date: d(2024, 1, 1),
            calibration_frequency: 90,
            ..NewInstrument::default()
        })
        .unwrap();
    // due 2024-12-31: current
    h.registry
        .create_instrument(&NewInstrument {
            name: "Scale".to_string(),
            department_id: Some(dept.id),
            last_calibration_date: d(2024, 1, 1),
            calibration_frequency: 365,
            ..NewInstrument::default()
        })
        .unwrap();

    let token = login(&h.router, "admin", "change-me-now").await;
    let (status, summary) = call(&h.router, Method::POST, "/api/reminders/send", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["sent"], 1);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["skipped"], 1);

    let sent = h.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "qa@company.com");
    assert_eq!(sent[0].subject, "Calibration Reminder: Multimeter");

    let (status, log) = call(&h.router, Method::GET, "/api/reminders?limit=10", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log.as_array().unwrap().len(), 1);
    assert_eq!(log[0]["reminder_date"], "2024-03-20");
}

#[tokio::test]
async fn dashboard_and_report_reflect_fixed_clock() {
    let h = harness();
    h.registry
        .create_instrument(&NewInstrument {
            name: "Thermometer".to_string(),
            last_calibration_date: d(2023, 12, 1),
            calibration_frequency: 90,
            ..NewInstrument::default()
        })
        .unwrap();
    let token = login(&h.router, "tech", "bench-pass-1").await;

    let (status, dash) = call(&h.router, Method::GET, "/api/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["stats"]["overdue"], 1);
    assert_eq!(dash["instruments"][0]["state"], "overdue");
    assert_eq!(dash["instruments"][0]["department"], "No Department");

    let (status, report) = call(&h.router, Method::GET, "/api/reports", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report[0]["next_calibration_date"], "2024-02-29");
}

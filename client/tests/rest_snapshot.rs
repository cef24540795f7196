//! REST client tests against a local mock of the attendance API.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use attendance_client::{AttendanceRestClient, RestConfig, RestError, SnapshotSource, Timestamp};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct MockBackend {
    status_hits: Arc<Mutex<HashMap<String, usize>>>,
    page_queries: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockBackend {
    fn hits(&self, person_id: &str) -> usize {
        self.status_hits
            .lock()
            .expect("lock")
            .get(person_id)
            .copied()
            .unwrap_or(0)
    }
}

fn ok(data: Value) -> Response {
    Json(json!({ "success": true, "data": data })).into_response()
}

fn person(id: &str, first: &str, last: &str, status: &str) -> Value {
    json!({
        "id": id,
        "first_name": first,
        "last_name": last,
        "department": "Engineering",
        "status": status,
    })
}

async fn persons(
    Query(query): Query<HashMap<String, String>>,
    State(backend): State<MockBackend>,
) -> Response {
    let page = query.get("page").cloned().unwrap_or_default();
    let page_size = query.get("page_size").cloned().unwrap_or_default();
    backend
        .page_queries
        .lock()
        .expect("lock")
        .push((page.clone(), page_size));

    match page.as_str() {
        "1" => Json(json!({
            "success": true,
            "data": [person("P1", "Ada", "L", "active"), person("P2", "Bo", "B", "inactive")],
            "meta": { "page": 1, "pageSize": 2, "total": 3, "totalPages": 2 },
        }))
        .into_response(),
        "2" => Json(json!({
            "success": true,
            "data": [person("P3", "Cleo", "C", "active")],
            "meta": { "page": 2, "pageSize": 2, "total": 3, "totalPages": 2 },
        }))
        .into_response(),
        _ => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "success": false,
                "error": { "code": "VALIDATION_ERROR", "message": "page out of range" },
                "requestId": "req-7",
            })),
        )
            .into_response(),
    }
}

async fn person_status(
    Path(person_id): Path<String>,
    State(backend): State<MockBackend>,
) -> Response {
    let hits = {
        let mut status_hits = backend.status_hits.lock().expect("lock");
        let count = status_hits.entry(person_id.clone()).or_insert(0);
        *count += 1;
        *count
    };

    match (person_id.as_str(), hits) {
        ("P1", _) => ok(json!({
            "person_id": "P1",
            "person_name": "",
            "checked_in": true,
            "check_in_time": "2024-01-15T08:00:00",
            "current_duration_minutes": 150,
        })),
        ("P3", _) => ok(json!({
            "person_id": "P3",
            "person_name": "",
            "checked_in": true,
            "check_in_time": "2024-01-15T08:15:00",
        })),
        ("P7", n) if n <= 2 => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "0")],
            Json(json!({ "detail": "Too many requests" })),
        )
            .into_response(),
        ("P8", 1) => (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response(),
        ("P7" | "P8", _) => ok(json!({
            "person_id": person_id,
            "person_name": "Retry Person",
            "checked_in": false,
        })),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Person not found" })),
        )
            .into_response(),
    }
}

async fn daily_report(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if token == Some("Bearer viewer-token") {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "detail": "You don't have permission to view reports" })),
        )
            .into_response();
    }

    let date = query
        .get("date")
        .cloned()
        .unwrap_or_else(|| "2024-01-15".to_string());
    ok(json!({
        "date": format!("{}T00:00:00", date),
        "total_persons": 2,
        "present": 1,
        "absent": 1,
        "late": 0,
        "early_leave": 0,
        "presence_percentage": 50.0,
        "status_breakdown": { "present": 1, "absent": 1 },
    }))
}

async fn spawn_backend() -> (SocketAddr, MockBackend) {
    let backend = MockBackend::default();
    let app = Router::new()
        .route("/api/v1/persons", get(persons))
        .route("/api/v1/attendance/status/{person_id}", get(person_status))
        .route("/api/v1/attendance/reports/daily", get(daily_report))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    (addr, backend)
}

fn rest_config(addr: SocketAddr) -> RestConfig {
    RestConfig::new(format!("http://{}/api/v1", addr))
        .with_timeout(Duration::from_secs(5))
        .with_page_size(2)
        .with_retry_delay(Duration::from_millis(10), Duration::from_millis(50))
}

#[tokio::test]
async fn test_snapshot_follows_pages_and_skips_inactive() {
    let (addr, backend) = spawn_backend().await;
    let client = AttendanceRestClient::new(rest_config(addr)).expect("client");

    let snapshot = client.fetch_snapshot().await.expect("snapshot");

    let ids: Vec<&str> = snapshot.iter().map(|s| s.person_id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P3"]);

    assert_eq!(snapshot[0].person_name, "Ada L");
    assert!(snapshot[0].checked_in);
    assert_eq!(
        snapshot[0].check_in_time,
        Some(Timestamp::parse("2024-01-15T08:00:00").expect("ts"))
    );
    assert_eq!(snapshot[0].current_duration_minutes, Some(150));

    assert_eq!(snapshot[1].person_name, "Cleo C");
    assert!(snapshot[1].checked_in);
    assert_eq!(
        snapshot[1].check_in_time,
        Some(Timestamp::parse("2024-01-15T08:15:00").expect("ts"))
    );

    assert_eq!(backend.hits("P2"), 0);
    let queries = backend.page_queries.lock().expect("lock").clone();
    assert_eq!(
        queries,
        vec![
            ("1".to_string(), "2".to_string()),
            ("2".to_string(), "2".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_daily_summary() {
    let (addr, _backend) = spawn_backend().await;
    let client = AttendanceRestClient::new(rest_config(addr)).expect("client");

    let summary = client.get_daily_summary(None).await.expect("summary");
    assert_eq!(summary.present, 1);
    assert_eq!(summary.total_persons, 2);
    assert_eq!(summary.status_breakdown.get("absent"), Some(&1));

    let date = NaiveDate::from_ymd_opt(2024, 1, 16).expect("date");
    let summary = client.get_daily_summary(Some(date)).await.expect("summary");
    assert_eq!(
        summary.date,
        Timestamp::parse("2024-01-16T00:00:00").expect("ts")
    );
}

#[tokio::test]
async fn test_daily_summary_forbidden_for_viewer() {
    let (addr, _backend) = spawn_backend().await;
    let client = AttendanceRestClient::new(rest_config(addr).with_api_token("viewer-token"))
        .expect("client");

    let err = client
        .get_daily_summary(None)
        .await
        .expect_err("viewer cannot read reports");
    match err {
        RestError::Forbidden(message) => {
            assert_eq!(message, "You don't have permission to view reports");
        }
        other => panic!("expected Forbidden, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let (addr, backend) = spawn_backend().await;
    let client =
        AttendanceRestClient::new(rest_config(addr).with_max_retries(2)).expect("client");

    let status = client.get_person_status("P7").await.expect("status");
    assert_eq!(status.person_name, "Retry Person");
    assert_eq!(backend.hits("P7"), 3);
}

#[tokio::test]
async fn test_rate_limit_outlasts_retries() {
    let (addr, backend) = spawn_backend().await;
    let client =
        AttendanceRestClient::new(rest_config(addr).with_max_retries(1)).expect("client");

    let err = client
        .get_person_status("P7")
        .await
        .expect_err("still rate limited");
    assert!(matches!(
        err,
        RestError::RateLimited {
            retry_after: Some(0)
        }
    ));
    assert_eq!(backend.hits("P7"), 2);
}

#[tokio::test]
async fn test_server_error_is_retried_with_backoff() {
    let (addr, backend) = spawn_backend().await;
    let client = AttendanceRestClient::new(rest_config(addr)).expect("client");

    let status = client.get_person_status("P8").await.expect("status");
    assert!(!status.checked_in);
    assert_eq!(backend.hits("P8"), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (addr, backend) = spawn_backend().await;
    let client = AttendanceRestClient::new(rest_config(addr)).expect("client");

    let err = client
        .get_person_status("P404")
        .await
        .expect_err("unknown person");
    assert!(matches!(err, RestError::NotFound(ref path) if path == "/api/v1/attendance/status/P404"));
    assert_eq!(backend.hits("P404"), 1);

    let err = client.list_persons(9, 2).await.expect_err("page out of range");
    match err {
        RestError::Api {
            status,
            code,
            request_id,
            ..
        } => {
            assert_eq!(status, 422);
            assert_eq!(code, "VALIDATION_ERROR");
            assert_eq!(request_id.as_deref(), Some("req-7"));
        }
        other => panic!("expected Api, got {:?}", other),
    }
}

//! Source tests against local HTTP servers

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use fixloop::app::options::MonitorConfig;
use fixloop::http::client::HttpClient;
use fixloop::models::levels::Severity;
use fixloop::monitor::sources::ci::CiFetch;
use fixloop::monitor::sources::poll::PollingSource;
use fixloop::monitor::sources::push::PushSource;
use fixloop::monitor::sources::server_log::ServerLogFetch;
use fixloop::monitor::sources::stream::StreamSource;
use fixloop::monitor::sources::tracker::TrackerFetch;
use fixloop::monitor::sources::{ErrorSource, SourceKind};
use fixloop::monitor::Monitor;
use fixloop::server::handlers::PushResponse;
use fixloop::utils::CooldownOptions;
use futures::SinkExt;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::protocol::Message;

const POLL: Duration = Duration::from_millis(50);

struct Mock {
    hits: AtomicU32,
    status: StatusCode,
    body: Value,
}

async fn mock_handler(State(mock): State<Arc<Mock>>) -> (StatusCode, Json<Value>) {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    (mock.status, Json(mock.body.clone()))
}

/// Serve `body` with `status` on `path`
async fn mock_server(path: &str, status: StatusCode, body: Value) -> (SocketAddr, Arc<Mock>) {
    let mock = Arc::new(Mock {
        hits: AtomicU32::new(0),
        status,
        body,
    });
    let app = Router::new()
        .route(path, get(mock_handler))
        .with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, mock)
}

async fn eventually<F: Fn() -> bool>(check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

fn http() -> Arc<HttpClient> {
    Arc::new(HttpClient::new(Duration::from_secs(5)).unwrap())
}

fn monitor(source: Arc<dyn ErrorSource>) -> Monitor {
    Monitor::new(&MonitorConfig::default(), vec![source]).unwrap()
}

#[tokio::test]
async fn test_push_receiver_records_reports() {
    let push = Arc::new(PushSource::new("127.0.0.1:0".to_string()));
    let monitor = monitor(push.clone());
    monitor.start_monitoring("https://preview.example.com").unwrap();
    eventually(|| push.local_addr().is_some()).await;
    let addr = push.local_addr().unwrap();

    let client = reqwest::Client::new();
    let report = json!({
        "message": "ReferenceError: cartTotal is not defined",
        "file": "src/cart.js",
        "line": 12,
        "severity": "high"
    });
    let response = client
        .post(format!("http://{}/errors", addr))
        .json(&json!([report.clone(), report, {"message": "Failed to fetch", "severity": "low"}]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    let ack: PushResponse = response.json().await.unwrap();
    assert_eq!(ack.accepted, 3);

    let errors = monitor.get_current_errors();
    assert_eq!(errors.len(), 2);
    let repeated = errors
        .iter()
        .find(|e| e.source.file == "src/cart.js")
        .unwrap();
    assert_eq!(repeated.occurrence_count, 2);
    assert_eq!(repeated.severity, Severity::High);

    let health = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert!(health.status().is_success());
    drop(client);

    // The receiver shuts down on its own and releases its address
    monitor.stop_monitoring();
    eventually(|| push.local_addr().is_none()).await;
    assert!(reqwest::get(format!("http://{}/health", addr)).await.is_err());
}

#[tokio::test]
async fn test_tracker_poll_reports_each_issue_once() {
    let issues = json!([{
        "id": "iss-1",
        "title": "TypeError: Cannot read properties of undefined (reading 'price')",
        "level": "fatal",
        "count": 7,
        "metadata": {"filename": "src/checkout.js", "lineno": 88}
    }]);
    let (addr, mock) = mock_server("/projects/shop/issues", StatusCode::OK, issues).await;

    let fetch = TrackerFetch::new(http(), format!("http://{}", addr), "shop".to_string(), None);
    let source = Arc::new(PollingSource::new(SourceKind::Tracker, POLL, fetch));
    let monitor = monitor(source);
    monitor.start_monitoring("https://preview.example.com").unwrap();

    eventually(|| mock.hits.load(Ordering::SeqCst) >= 3).await;
    monitor.stop_monitoring();

    let errors = monitor.get_current_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].severity, Severity::Critical);
    assert_eq!(errors[0].source.file, "src/checkout.js");
    assert_eq!(errors[0].source.line, 88);
    // Repeated polls do not inflate the tracker's own count
    assert_eq!(errors[0].occurrence_count, 7);
    assert!(monitor.degraded_sources().is_empty());
}

#[tokio::test]
async fn test_failing_poll_degrades_source() {
    let (addr, mock) = mock_server(
        "/projects/shop/issues",
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "boom"}),
    )
    .await;

    let fetch = TrackerFetch::new(http(), format!("http://{}", addr), "shop".to_string(), None);
    let source = Arc::new(PollingSource::new(SourceKind::Tracker, POLL, fetch));
    let monitor = monitor(source);
    monitor.start_monitoring("https://preview.example.com").unwrap();

    // Polling keeps going after a failure
    eventually(|| mock.hits.load(Ordering::SeqCst) >= 2).await;
    monitor.stop_monitoring();

    assert!(monitor.get_current_errors().is_empty());
    assert_eq!(monitor.degraded_sources(), vec!["tracker".to_string()]);
}

#[tokio::test]
async fn test_ci_failure_becomes_deployment_error() {
    let runs = json!([
        {"id": "101", "name": "build", "status": "completed", "conclusion": "failure", "head_sha": "abc1234"},
        {"id": "102", "name": "lint", "status": "completed", "conclusion": "success"},
        {"id": "103", "name": "e2e", "status": "in_progress"}
    ]);
    let (addr, mock) = mock_server("/runs", StatusCode::OK, runs).await;

    let fetch = CiFetch::new(http(), format!("http://{}/runs", addr), None);
    let source = Arc::new(PollingSource::new(SourceKind::Ci, POLL, fetch));
    let monitor = monitor(source);
    monitor.start_monitoring("https://preview.example.com").unwrap();

    eventually(|| mock.hits.load(Ordering::SeqCst) >= 2).await;
    monitor.stop_monitoring();

    let errors = monitor.get_current_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].category, "deployment");
    assert_eq!(errors[0].severity, Severity::High);
    assert!(errors[0].message.contains("build"));
}

#[tokio::test]
async fn test_server_log_skips_old_entries() {
    let now = Utc::now();
    let page = json!({
        "entries": [
            {
                "timestamp": (now - chrono::Duration::hours(1)).to_rfc3339(),
                "level": "error",
                "message": "stale failure"
            },
            {
                "timestamp": (now + chrono::Duration::minutes(5)).to_rfc3339(),
                "level": "error",
                "message": "database connection refused",
                "file": "server/db.js",
                "line": 14
            }
        ]
    });
    let (addr, mock) = mock_server("/logs", StatusCode::OK, page).await;

    let fetch = ServerLogFetch::new(http(), format!("http://{}/logs", addr), None);
    let source = Arc::new(PollingSource::new(SourceKind::ServerLog, POLL, fetch));
    let monitor = monitor(source);
    monitor.start_monitoring("https://preview.example.com").unwrap();

    eventually(|| mock.hits.load(Ordering::SeqCst) >= 2).await;
    monitor.stop_monitoring();

    let errors = monitor.get_current_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "database connection refused");
    assert_eq!(errors[0].category, "server");
    assert_eq!(errors[0].severity, Severity::High);
}

#[tokio::test]
async fn test_dropped_stream_degrades_source() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Every connection gets one frame, then the server hangs up
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let frame = json!({
                "message": "TypeError: Cannot read properties of null (reading 'id')",
                "filename": "src/profile.js",
                "lineno": 31,
                "level": "error"
            });
            let _ = ws.send(Message::Text(frame.to_string().into())).await;
            let _ = ws.close(None).await;
        }
    });

    let source = StreamSource::new(Some(format!("ws://{}/live", addr)), "/live".to_string())
        .with_cooldown(CooldownOptions {
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
        });
    let monitor = monitor(Arc::new(source));
    monitor.start_monitoring("http://preview.example.com").unwrap();

    eventually(|| !monitor.degraded_sources().is_empty()).await;
    eventually(|| !monitor.get_current_errors().is_empty()).await;
    monitor.stop_monitoring();

    assert_eq!(monitor.degraded_sources(), vec!["stream".to_string()]);
    let errors = monitor.get_current_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source.file, "src/profile.js");
    assert_eq!(errors[0].severity, Severity::High);
}

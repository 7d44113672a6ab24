//! Integration tests against a fake campaign backend.
//!
//! Each test spins up an Axum server on a random port that speaks the
//! `{ success, data, message }` envelope, and drives the real reqwest client,
//! probe, supervisor and wizard against it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use campaign_wizard::api::{CampaignApi, CampaignId, DnsRequest, HttpCampaignApi};
use campaign_wizard::config::{ApiConfig, OperationPolicy};
use campaign_wizard::connectivity::{ConnectivityProbe, ConnectivityStatus};
use campaign_wizard::driver::{CampaignPlan, DriveEvent, DriverOptions, WizardDriver};
use campaign_wizard::error::{ApiError, ErrorKind, OperationError};
use campaign_wizard::operation::OperationKind;
use campaign_wizard::wizard::{SessionFile, StepKind, WizardSession};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Scripted reply for the clone endpoint.
#[derive(Clone)]
enum CloneReply {
    Status(StatusCode),
    Ok,
}

#[derive(Default)]
struct Backend {
    healthy: bool,
    campaigns: u32,
    steps: HashMap<String, Value>,
    clone_script: VecDeque<CloneReply>,
    clone_delay: Option<Duration>,
    dns_delay: Option<Duration>,
    reject_generate: bool,
    auth_headers: Vec<String>,
}

type Shared = Arc<Mutex<Backend>>;

fn ok(data: Value) -> (StatusCode, axum::Json<Value>) {
    (StatusCode::OK, axum::Json(json!({"success": true, "data": data})))
}

fn record_auth(state: &Shared, headers: &HeaderMap) {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.lock().unwrap().auth_headers.push(value.to_string());
    }
}

async fn health(State(state): State<Shared>) -> StatusCode {
    if state.lock().unwrap().healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn create_campaign(
    State(state): State<Shared>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> impl IntoResponse {
    record_auth(&state, &headers);
    if body["name"].as_str().unwrap_or_default().trim().len() < 3 {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"success": false, "message": "name too short"})),
        );
    }
    let mut backend = state.lock().unwrap();
    backend.campaigns += 1;
    ok(json!({"campaignId": format!("cmp-{}", backend.campaigns)}))
}

async fn save_step(
    State(state): State<Shared>,
    Path((id, segment)): Path<(String, String)>,
    axum::Json(body): axum::Json<Value>,
) -> impl IntoResponse {
    state
        .lock()
        .unwrap()
        .steps
        .insert(format!("{id}/{segment}"), body);
    ok(Value::Null)
}

async fn get_step(
    State(state): State<Shared>,
    Path((id, segment)): Path<(String, String)>,
) -> impl IntoResponse {
    let stored = state
        .lock()
        .unwrap()
        .steps
        .get(&format!("{id}/{segment}"))
        .cloned()
        .unwrap_or(Value::Null);
    ok(stored)
}

async fn clone_page(
    State(state): State<Shared>,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> impl IntoResponse {
    let (reply, delay) = {
        let mut backend = state.lock().unwrap();
        (
            backend.clone_script.pop_front().unwrap_or(CloneReply::Ok),
            backend.clone_delay,
        )
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    match reply {
        CloneReply::Status(status) => (
            status,
            axum::Json(json!({"success": false, "message": "upstream site unavailable"})),
        ),
        CloneReply::Ok => ok(json!({
            "previewUrl": format!("https://preview.test/{id}?src={}", body["url"].as_str().unwrap_or_default())
        })),
    }
}

async fn select_template(
    Path(id): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> impl IntoResponse {
    ok(json!({
        "previewUrl": format!("https://preview.test/{id}/t/{}", body["templateId"].as_str().unwrap_or_default())
    }))
}

async fn validate_landing() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(json!({"success": true, "message": "landing page ready"})),
    )
}

async fn configure_dns(State(state): State<Shared>) -> impl IntoResponse {
    let delay = state.lock().unwrap().dns_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    ok(json!({
        "validationResults": {
            "spf": "valid",
            "dkim": "valid",
            "dmarc": "missing",
            "validationComplete": true
        }
    }))
}

async fn generate_templates(
    State(state): State<Shared>,
    axum::Json(body): axum::Json<Value>,
) -> impl IntoResponse {
    if state.lock().unwrap().reject_generate {
        return (
            StatusCode::OK,
            axum::Json(json!({"success": false, "message": "quota exceeded"})),
        );
    }
    let count = body["count"].as_u64().unwrap_or(1);
    let templates: Vec<Value> = (1..=count)
        .map(|i| json!({"id": format!("gen-{i}"), "name": format!("Generated {i}")}))
        .collect();
    ok(json!({"templates": templates}))
}

/// Start the fake backend on a random port, return (base_url, state).
async fn start_backend() -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(Backend {
        healthy: true,
        ..Default::default()
    }));
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/campaigns", post(create_campaign))
        .route(
            "/api/campaigns/{id}/steps/{segment}",
            put(save_step).get(get_step),
        )
        .route("/api/campaigns/{id}/landing-page/clone", post(clone_page))
        .route("/api/campaigns/{id}/landing-page/template", post(select_template))
        .route("/api/campaigns/{id}/landing-page/validate", post(validate_landing))
        .route("/api/campaigns/{id}/dns", post(configure_dns))
        .route("/api/campaigns/{id}/templates/generate", post(generate_templates))
        .with_state(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), state)
}

fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        token: Some(secrecy::SecretString::from("test-token".to_string())),
        request_timeout: Duration::from_secs(2),
        health_timeout: Duration::from_secs(1),
    }
}

fn client(config: &ApiConfig) -> Arc<dyn CampaignApi> {
    Arc::new(HttpCampaignApi::new(config).unwrap())
}

fn plan() -> CampaignPlan {
    serde_json::from_value(json!({
        "general": {
            "name": "Q3 awareness",
            "description": "Quarterly phishing drill",
            "launchAt": (chrono::Utc::now() + chrono::Duration::days(10)).to_rfc3339(),
            "timezone": "UTC"
        },
        "targets": [
            {"firstName": "Ada", "lastName": "Lovelace", "email": "ada@corp.test", "department": "R&D"},
            {"firstName": "Alan", "lastName": "Turing", "email": "alan@corp.test"}
        ],
        "templates": {"templateType": "email", "topic": "password expiry", "count": 3, "select": ["gen-2"]},
        "landingPage": {"cloneUrl": "https://login.corp.test"},
        "smtp": {"fromEmail": "it-support@corp.test", "fromName": "IT Support"},
        "training": {"enabled": false}
    }))
    .unwrap()
}

fn driver(
    api: Arc<dyn CampaignApi>,
    dir: &tempfile::TempDir,
) -> (WizardDriver, Arc<Mutex<Vec<DriveEvent>>>) {
    let probe = ConnectivityProbe::from_api(
        Arc::clone(&api),
        Duration::from_secs(1),
        Duration::from_millis(10),
    );
    let session = WizardSession::new(
        Arc::clone(&api),
        probe.clone(),
        SessionFile::new(dir.path().join("session.json")),
    );
    let policy = OperationPolicy {
        tick_interval: Duration::from_millis(20),
        ..OperationPolicy::default()
    };
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let driver = WizardDriver::new(session, api, probe, policy)
        .with_options(DriverOptions {
            offline_retries: 1,
            offline_delay: Duration::from_millis(10),
        })
        .on_event(move |e| sink.lock().unwrap().push(e.clone()));
    (driver, events)
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_wizard_over_http() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, state) = start_backend().await;
        let dir = tempfile::tempdir().unwrap();
        let (mut driver, _events) = driver(client(&api_config(&base_url)), &dir);

        driver.run(&plan()).await.unwrap();
        assert!(driver.session().is_finished());
        assert_eq!(driver.session().campaign_id().unwrap().as_str(), "cmp-1");

        let backend = state.lock().unwrap();
        assert_eq!(backend.campaigns, 1);
        for segment in ["targets", "templates", "landing-page", "smtp", "training"] {
            assert!(
                backend.steps.contains_key(&format!("cmp-1/{segment}")),
                "{segment} was not saved"
            );
        }
        assert_eq!(
            backend.steps["cmp-1/templates"]["primaryTemplateId"],
            "gen-2"
        );
        assert_eq!(
            backend.steps["cmp-1/landing-page"]["clonedPreviewUrl"],
            "https://preview.test/cmp-1?src=https://login.corp.test"
        );
        assert_eq!(backend.steps["cmp-1/smtp"]["dns"]["dmarc"], "missing");
        assert!(
            backend
                .auth_headers
                .iter()
                .all(|h| h == "Bearer test-token")
        );
        assert!(!backend.auth_headers.is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn clone_recovers_after_server_errors() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, state) = start_backend().await;
        state.lock().unwrap().clone_script = VecDeque::from([
            CloneReply::Status(StatusCode::BAD_GATEWAY),
            CloneReply::Status(StatusCode::SERVICE_UNAVAILABLE),
            CloneReply::Ok,
        ]);
        let dir = tempfile::tempdir().unwrap();
        let (mut driver, events) = driver(client(&api_config(&base_url)), &dir);

        driver.run(&plan()).await.unwrap();

        let events = events.lock().unwrap();
        let failures: Vec<(ErrorKind, Option<String>)> = events
            .iter()
            .filter_map(|e| match e {
                DriveEvent::OperationFailed {
                    kind: OperationKind::Clone,
                    error,
                    retry_label,
                } => Some((error.kind, retry_label.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            failures,
            vec![
                (ErrorKind::Http5xx, Some("Retry (1/3)".to_string())),
                (ErrorKind::Http5xx, Some("Retry (2/3)".to_string())),
            ]
        );
        assert!(events.contains(&DriveEvent::OperationSucceeded {
            kind: OperationKind::Clone,
            attempt: 3
        }));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn clone_client_error_is_not_retried() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, state) = start_backend().await;
        state.lock().unwrap().clone_script =
            VecDeque::from([CloneReply::Status(StatusCode::UNPROCESSABLE_ENTITY)]);
        let dir = tempfile::tempdir().unwrap();
        let (mut driver, _events) = driver(client(&api_config(&base_url)), &dir);

        let err = driver.run(&plan()).await.unwrap_err();
        assert!(err.to_string().contains("upstream site unavailable"), "{err}");
        assert_eq!(driver.session().current_step(), Some(StepKind::LandingPage));
        assert!(state.lock().unwrap().clone_script.is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn bounded_call_times_out_locally() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, state) = start_backend().await;
        state.lock().unwrap().dns_delay = Some(Duration::from_secs(2));
        let config = ApiConfig {
            request_timeout: Duration::from_millis(200),
            ..api_config(&base_url)
        };
        let api = client(&config);

        let err = api
            .configure_dns(
                &CampaignId::new("cmp-1"),
                &DnsRequest {
                    domain: "corp.test".into(),
                    from_email: "it-support@corp.test".into(),
                    from_name: "IT Support".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout { .. }), "{err}");
        let classified = OperationError::from(&err);
        assert_eq!(classified.kind, ErrorKind::Timeout);
        assert!(classified.is_retryable());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn clone_is_not_bound_by_request_timeout() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, state) = start_backend().await;
        state.lock().unwrap().clone_delay = Some(Duration::from_millis(600));
        let config = ApiConfig {
            request_timeout: Duration::from_millis(100),
            ..api_config(&base_url)
        };
        let api = client(&config);

        let page = api
            .clone_url(&CampaignId::new("cmp-1"), "https://login.corp.test")
            .await
            .unwrap();
        assert!(page.preview_url.starts_with("https://preview.test/cmp-1"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rejected_envelope_surfaces_backend_message() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, state) = start_backend().await;
        state.lock().unwrap().reject_generate = true;
        let api = client(&api_config(&base_url));

        let err = api
            .generate_templates(
                &CampaignId::new("cmp-1"),
                &campaign_wizard::api::GenerateTemplatesRequest {
                    template_type: "email".into(),
                    topic: "invoice".into(),
                    count: 2,
                    language: None,
                },
            )
            .await
            .unwrap_err();
        match err {
            ApiError::Rejected { message, .. } => assert_eq!(message, "quota exceeded"),
            other => panic!("expected Rejected, got {other}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn client_error_carries_envelope_message() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _state) = start_backend().await;
        let api = client(&api_config(&base_url));

        let settings: campaign_wizard::steps::GeneralSettings = serde_json::from_value(json!({
            "name": "ab",
            "launchAt": "2030-01-01T00:00:00Z"
        }))
        .unwrap();
        let err = api.create_campaign(&settings).await.unwrap_err();
        match &err {
            ApiError::Status {
                status, message, ..
            } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "name too short");
            }
            other => panic!("expected Status, got {other}"),
        }
        assert_eq!(OperationError::from(&err).kind, ErrorKind::Http4xx);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn probe_tracks_backend_health() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, state) = start_backend().await;
        let probe = ConnectivityProbe::from_api(
            client(&api_config(&base_url)),
            Duration::from_secs(1),
            Duration::ZERO,
        );
        assert_eq!(probe.status().await, ConnectivityStatus::Unknown);
        assert_eq!(probe.check().await, ConnectivityStatus::Connected);

        state.lock().unwrap().healthy = false;
        assert_eq!(probe.check().await, ConnectivityStatus::Disconnected);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_backend_is_disconnected() {
    timeout(TEST_TIMEOUT, async {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let api = client(&api_config(&format!("http://127.0.0.1:{port}")));
        let probe = ConnectivityProbe::from_api(Arc::clone(&api), Duration::from_secs(1), Duration::ZERO);
        assert_eq!(probe.check().await, ConnectivityStatus::Disconnected);

        let err = api
            .clone_url(&CampaignId::new("cmp-1"), "https://login.corp.test")
            .await
            .unwrap_err();
        assert_eq!(OperationError::from(&err).kind, ErrorKind::Network);
    })
    .await
    .expect("test timed out");
}

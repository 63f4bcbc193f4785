//! HTTP API tests against the full router, driven through `oneshot`.

mod common;

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use bizpulse::{
    EmptySource, Integration, ManualClock, MetricType, NewIntegration, Platform, RateLimitConfig,
    Stores,
};
use chrono::Duration as ChronoDuration;
use common::{ORGANIZATION, commerce_headers, paid_order, secrets, start};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use server::{ServerConfig, ServerState};
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

const API_KEY: &str = "test-key";
const ADMIN_KEY: &str = "admin-key";

fn config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.api_keys.insert(API_KEY.to_string());
    config.admin_api_keys.insert(ADMIN_KEY.to_string());
    config.webhooks = secrets();
    config.metrics_enabled = false;
    config
}

struct TestServer {
    router: Router,
    state: Arc<ServerState>,
    clock: Arc<ManualClock>,
}

impl TestServer {
    fn new(config: ServerConfig) -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let state = Arc::new(
            ServerState::with_parts(
                config,
                Stores::in_memory(),
                clock.clone(),
                Arc::new(EmptySource),
            )
            .unwrap(),
        );
        Self {
            router: server::build_router(state.clone()),
            state,
            clock,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    async fn get(&self, uri: &str, key: Option<&str>) -> (StatusCode, HeaderMap, Value) {
        let mut request = Request::builder().method(Method::GET).uri(uri);
        if let Some(key) = key {
            request = request.header("x-api-key", key);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        key: &str,
        body: Value,
    ) -> (StatusCode, HeaderMap, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {key}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn webhook(
        &self,
        platform: &str,
        integration_id: &str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(format!("/webhooks/{platform}/{integration_id}"));
        if let Some(map) = request.headers_mut() {
            map.extend(headers);
        }
        self.send(request.body(Body::from(body)).unwrap()).await
    }

    async fn commerce_integration(&self) -> Integration {
        self.state
            .stores
            .integrations
            .upsert_integration(
                NewIntegration {
                    organization_id: ORGANIZATION.to_string(),
                    platform: Platform::Commerce,
                    external_account_id: "shop-1".to_string(),
                    credentials: None,
                },
                start(),
            )
            .await
            .unwrap()
    }
}

fn rfc3339(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn day_range() -> (String, String) {
    (
        rfc3339(start() - ChronoDuration::hours(18)),
        rfc3339(start() + ChronoDuration::hours(6)),
    )
}

#[tokio::test]
async fn health_and_readiness_are_public() {
    let server = TestServer::new(config());

    let (status, _, body) = server.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _, body) = server.get("/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["webhooks"], json!(["commerce", "payments"]));

    let (status, headers, _) = server.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn metrics_endpoint_is_absent_when_disabled() {
    let server = TestServer::new(config());
    let (status, _, body) = server.get("/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn api_requires_a_valid_key() {
    let server = TestServer::new(config());

    let (status, _, body) = server.get("/api/v1/metadata", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_FAILED");
    assert!(body["error"]["message"].as_str().unwrap().contains("X-API-Key"));

    let (status, _, _) = server.get("/api/v1/metadata", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = server.get("/api/v1/metadata", Some(API_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn repeated_bad_keys_are_throttled() {
    let server = TestServer::new(config());

    for _ in 0..5 {
        let (status, _, _) = server.get("/api/v1/metadata", Some("guess")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, headers, body) = server.get("/api/v1/metadata", Some("guess")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
    assert!(headers.contains_key(header::RETRY_AFTER));

    // Valid keys are not held back by someone else's guessing.
    let (status, _, _) = server.get("/api/v1/metadata", Some(API_KEY)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn webhook_is_processed_once_and_queryable() {
    let server = TestServer::new(config());
    let integration = server.commerce_integration().await;
    let id = integration.id.to_string();
    let body = paid_order(5001, "100.00");
    let headers = commerce_headers(&body, "orders/paid");

    let (status, _, first) = server
        .webhook("commerce", &id, body.clone(), headers.clone())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "processed");
    assert_eq!(first["points"], 2);

    let (status, _, replay) = server.webhook("commerce", &id, body, headers).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["status"], "duplicate");
    assert_eq!(replay["event_id"], first["event_id"]);

    let (from, to) = day_range();
    let uri = format!("/api/v1/metrics?integration_ids={id}&start={from}&end={to}");
    let (status, _, summary) = server.get(&uri, Some(API_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["data_state"], "ready");
    assert_eq!(summary["revenue"]["current"], 100.0);
    assert_eq!(summary["orders"]["current"], 1.0);
    assert_eq!(summary["revenue"]["trend"], "up");
}

#[tokio::test]
async fn webhook_failures_use_the_error_shape() {
    let server = TestServer::new(config());
    let integration = server.commerce_integration().await;
    let id = integration.id.to_string();
    let body = paid_order(5002, "100.00");
    let headers = commerce_headers(&body, "orders/paid");

    let tampered = paid_order(5002, "1.00");
    let (status, _, err) = server
        .webhook("commerce", &id, tampered, headers.clone())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"]["code"], "SIGNATURE_INVALID");
    assert_eq!(err["error"]["message"], "signature mismatch");

    let (status, _, err) = server
        .webhook("commerce", &uuid::Uuid::new_v4().to_string(), body.clone(), headers.clone())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "UNKNOWN_INTEGRATION");

    let (status, _, err) = server
        .webhook("commerce", "not-a-uuid", body.clone(), headers.clone())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "UNKNOWN_INTEGRATION");

    let (status, _, err) = server
        .webhook("fax-machine", &id, body.clone(), headers.clone())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "UNSUPPORTED_PLATFORM");

    let (status, _, err) = server.webhook("ads", &id, body, headers).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "UNSUPPORTED_PLATFORM");

    let events = server
        .state
        .stores
        .events
        .events_for_integration(integration.id)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn webhook_limit_answers_429_with_retry_after() {
    let mut config = config();
    config.rate_limits.webhook = RateLimitConfig::new(1, Duration::from_secs(60));
    let server = TestServer::new(config);
    let integration = server.commerce_integration().await;
    let id = integration.id.to_string();

    let body = paid_order(6001, "10.00");
    let (status, _, _) = server
        .webhook("commerce", &id, body.clone(), commerce_headers(&body, "orders/paid"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let body = paid_order(6002, "10.00");
    let headers = commerce_headers(&body, "orders/paid");
    let (status, response_headers, err) = server
        .webhook("commerce", &id, body.clone(), headers.clone())
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(err["error"]["code"], "RATE_LIMIT_EXCEEDED");
    let retry: u64 = response_headers[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry));

    server.clock.advance(Duration::from_secs(retry));
    let (status, _, _) = server.webhook("commerce", &id, body, headers).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn period_queries_validate_their_selectors() {
    let server = TestServer::new(config());
    let (from, to) = day_range();

    let uri = format!(
        "/api/v1/metrics?integration_ids={}&organization_id=org&start={from}&end={to}",
        uuid::Uuid::new_v4()
    );
    let (status, _, err) = server.get(&uri, Some(API_KEY)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "BAD_REQUEST");

    let uri =
        format!("/api/v1/metrics?organization_id=org&start={from}&end={to}&compare_start={from}");
    let (status, _, _) = server.get(&uri, Some(API_KEY)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/v1/metrics?organization_id=org&start={to}&end={from}");
    let (status, _, _) = server.get(&uri, Some(API_KEY)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri =
        format!("/api/v1/recommendations?organization_id=org-empty&start={from}&end={to}");
    let (status, _, advice) = server.get(&uri, Some(API_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(advice["data_state"], "no_integrations");
    assert_eq!(
        advice["recommendations"][0]["title"],
        "Connect your first integration"
    );
}

#[tokio::test]
async fn report_lifecycle() {
    let server = TestServer::new(config());
    let integration = server.commerce_integration().await;
    server
        .state
        .stores
        .points
        .append_points(vec![
            bizpulse::DataPoint::new(
                integration.id,
                MetricType::Revenue,
                250.0,
                json!({"currency": "USD"}),
                start() - ChronoDuration::hours(2),
            )
            .unwrap(),
        ])
        .await
        .unwrap();

    let (from, to) = day_range();
    let (status, _, report) = server
        .json(
            Method::POST,
            "/api/v1/reports",
            API_KEY,
            json!({"organization_id": ORGANIZATION, "start": from, "end": to}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["metrics"]["revenue"]["current"], 250.0);
    assert_eq!(report["read"], false);
    let report_id = report["id"].as_str().unwrap().to_string();

    let (status, _, list) = server
        .get(&format!("/api/v1/reports?organization_id={ORGANIZATION}"), Some(API_KEY))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
    assert_eq!(list["reports"][0]["id"], report["id"]);

    let (status, _, read) = server
        .json(
            Method::PUT,
            &format!("/api/v1/reports/{report_id}/read"),
            API_KEY,
            json!({"read": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["read"], true);

    let delete = |key: &'static str| {
        Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/v1/reports/{report_id}"))
            .header("x-api-key", key)
            .body(Body::empty())
            .unwrap()
    };
    let (status, _, err) = server.send(delete(API_KEY)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"]["code"], "FORBIDDEN");

    let (status, _, _) = server.send(delete(ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, err) = server
        .get(&format!("/api/v1/reports/{report_id}"), Some(API_KEY))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn integrations_connect_list_and_disconnect() {
    let server = TestServer::new(config());

    let (status, _, created) = server
        .json(
            Method::POST,
            "/api/v1/integrations",
            API_KEY,
            json!({
                "organization_id": ORGANIZATION,
                "platform": "commerce",
                "external_account_id": "shop-9",
                "credentials": "secret-token",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(created["status"], "pending");
    assert!(created.get("credentials").is_none());
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _, list) = server
        .get(
            &format!("/api/v1/integrations?organization_id={ORGANIZATION}"),
            Some(API_KEY),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/v1/integrations/{id}"))
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, _, disconnected) = server.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(disconnected["status"], "disconnected");

    let body = paid_order(7001, "10.00");
    let headers = commerce_headers(&body, "orders/paid");
    let (status, _, _) = server.webhook("commerce", &id, body, headers).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, err) = server
        .json(
            Method::POST,
            "/api/v1/integrations",
            API_KEY,
            json!({
                "organization_id": " ",
                "platform": "payments",
                "external_account_id": "acct",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn unknown_routes_use_the_error_shape() {
    let server = TestServer::new(config());
    let (status, _, err) = server.get("/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "NOT_FOUND");
    assert_eq!(err["error"]["message"], "route not found");
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn request_logs_carry_the_request_id() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let server = TestServer::new(config());
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-log-42")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = server.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-request-id"], "req-log-42");

    let text = logs.text();
    let completed = text
        .lines()
        .find(|line| line.contains("request_completed"))
        .unwrap_or_else(|| panic!("no completion log in {text:?}"));
    assert!(completed.contains("request_id=req-log-42"), "{completed}");
}

//! End-to-end webhook handling over the in-memory stores.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bizpulse::model::DeliveryKey;
use bizpulse::ratelimit::FailurePolicy;
use bizpulse::store::{DataPointStore, WebhookEventStore};
use bizpulse::{
    DataPoint, DeliveryOutcome, IngestConfig, IntegrationId, MetricType, Platform,
    RateLimitConfig, RateLimitSettings, SignatureError, StoreError, Stores, Trend, WebhookStatus,
    Window, aggregate,
};
use chrono::Duration as ChronoDuration;
use common::{
    Harness, commerce_headers, day_window, paid_order, payment_succeeded, payments_headers,
    start,
};
use http::{HeaderMap, HeaderValue};
use uuid::Uuid;

fn processed(outcome: DeliveryOutcome) -> (Uuid, usize) {
    match outcome {
        DeliveryOutcome::Processed { event_id, points } => (event_id, points),
        other => panic!("expected processed, got {other:?}"),
    }
}

#[tokio::test]
async fn commerce_order_becomes_revenue_and_order() {
    let h = Harness::new();
    let integration = h.connect(Platform::Commerce).await;
    let body = paid_order(1001, "100.00");

    let outcome = h
        .pipeline
        .handle_delivery(
            Platform::Commerce,
            integration.id,
            &body,
            &commerce_headers(&body, "orders/paid"),
        )
        .await;
    let (event_id, appended) = processed(outcome);
    assert_eq!(appended, 2);

    let points = h.points(integration.id).await;
    let revenue = points
        .iter()
        .find(|p| p.metric == MetricType::Revenue)
        .unwrap();
    assert_eq!(revenue.value, 100.0);
    assert_eq!(revenue.currency(), Some("USD"));
    assert_eq!(revenue.occurred_at, start() - ChronoDuration::hours(1));

    let summary = aggregate(h.stores.points.as_ref(), &[integration.id], day_window(), None)
        .await
        .unwrap();
    assert_eq!(summary.revenue.current, 100.0);
    assert_eq!(summary.orders.current, 1.0);
    assert_eq!(summary.average_order_value.current, 100.0);
    assert_eq!(summary.revenue.trend, Trend::Up);

    let events = h.events(integration.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, event_id);
    assert_eq!(events[0].status, WebhookStatus::Processed);
    assert_eq!(events[0].topic, "orders/paid");
    assert_eq!(events[0].external_event_id.as_deref(), Some("1001"));
}

#[tokio::test]
async fn replayed_delivery_is_not_applied_twice() {
    let h = Harness::new();
    let integration = h.connect(Platform::Commerce).await;
    let body = paid_order(1001, "100.00");
    let headers = commerce_headers(&body, "orders/paid");

    let first = h
        .pipeline
        .handle_delivery(Platform::Commerce, integration.id, &body, &headers)
        .await;
    let (event_id, _) = processed(first);

    let replay = h
        .pipeline
        .handle_delivery(Platform::Commerce, integration.id, &body, &headers)
        .await;
    assert_eq!(replay, DeliveryOutcome::Duplicate { event_id });
    assert_eq!(replay.status_code(), http::StatusCode::OK);

    assert_eq!(h.points(integration.id).await.len(), 2);
    let events = h.events(integration.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].attempts, 2);
}

#[tokio::test]
async fn tampered_body_is_rejected_and_recorded() {
    let h = Harness::new();
    let integration = h.connect(Platform::Commerce).await;
    let signed = paid_order(1002, "100.00");
    let tampered = paid_order(1002, "999.00");

    let outcome = h
        .pipeline
        .handle_delivery(
            Platform::Commerce,
            integration.id,
            &tampered,
            &commerce_headers(&signed, "orders/paid"),
        )
        .await;
    assert_eq!(outcome, DeliveryOutcome::Unauthorized(SignatureError::Mismatch));
    assert_eq!(outcome.status_code(), http::StatusCode::UNAUTHORIZED);

    assert!(h.points(integration.id).await.is_empty());
    let events = h.events(integration.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, WebhookStatus::SignatureVerificationFailed);
    assert_eq!(events[0].topic, "orders/paid");
    assert_eq!(events[0].external_event_id, None);
    assert!(events[0].error.is_some());
}

#[tokio::test]
async fn signed_garbage_is_a_bad_request() {
    let h = Harness::new();
    let integration = h.connect(Platform::Commerce).await;
    let body = b"{not json";

    let outcome = h
        .pipeline
        .handle_delivery(
            Platform::Commerce,
            integration.id,
            body,
            &commerce_headers(body, "orders/paid"),
        )
        .await;
    match &outcome {
        DeliveryOutcome::BadRequest(detail) => assert!(detail.starts_with("invalid JSON")),
        other => panic!("expected bad request, got {other:?}"),
    }

    let events = h.events(integration.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, WebhookStatus::InvalidJson);
}

#[tokio::test]
async fn missing_topic_header_is_a_bad_request() {
    let h = Harness::new();
    let integration = h.connect(Platform::Commerce).await;
    let body = paid_order(1003, "10.00");
    let mut headers = commerce_headers(&body, "orders/paid");
    headers.remove(bizpulse::ingest::COMMERCE_TOPIC_HEADER);

    let outcome = h
        .pipeline
        .handle_delivery(Platform::Commerce, integration.id, &body, &headers)
        .await;
    assert!(matches!(outcome, DeliveryOutcome::BadRequest(_)));

    let events = h.events(integration.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].topic, bizpulse::UNKNOWN_TOPIC);
    assert!(h.points(integration.id).await.is_empty());
}

#[tokio::test]
async fn unknown_topic_is_processed_without_points() {
    let h = Harness::new();
    let integration = h.connect(Platform::Commerce).await;
    let body = paid_order(1004, "10.00");

    let outcome = h
        .pipeline
        .handle_delivery(
            Platform::Commerce,
            integration.id,
            &body,
            &commerce_headers(&body, "products/update"),
        )
        .await;
    let (_, appended) = processed(outcome);
    assert_eq!(appended, 0);
    assert!(h.points(integration.id).await.is_empty());
    assert_eq!(h.events(integration.id).await[0].status, WebhookStatus::Processed);
}

#[tokio::test]
async fn claimed_deliveries_without_observations_are_settled() {
    let h = Harness::new();
    let integration = h.connect(Platform::Payments).await;
    let body = String::from_utf8(payment_succeeded("evt_9", 500, start().timestamp()))
        .unwrap()
        .replace("payment_intent.succeeded", "invoice.created")
        .into_bytes();

    let outcome = h
        .pipeline
        .handle_delivery(
            Platform::Payments,
            integration.id,
            &body,
            &payments_headers(&body, start()),
        )
        .await;
    let (_, appended) = processed(outcome);
    assert_eq!(appended, 0);

    let events = h.events(integration.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].topic, "invoice.created");
    assert_eq!(events[0].status, WebhookStatus::Processed);
    assert!(events.iter().all(|e| e.status != WebhookStatus::Received));
}

#[tokio::test]
async fn payments_intent_becomes_revenue_in_major_units() {
    let h = Harness::new();
    let integration = h.connect(Platform::Payments).await;
    let body = payment_succeeded("evt_1", 2599, start().timestamp());

    let outcome = h
        .pipeline
        .handle_delivery(
            Platform::Payments,
            integration.id,
            &body,
            &payments_headers(&body, start()),
        )
        .await;
    let (_, appended) = processed(outcome);
    assert_eq!(appended, 1);

    let points = h.points(integration.id).await;
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].metric, MetricType::Revenue);
    assert_eq!(points[0].value, 25.99);
    assert_eq!(points[0].currency(), Some("USD"));

    let events = h.events(integration.id).await;
    assert_eq!(events[0].topic, "payment_intent.succeeded");
    assert_eq!(events[0].external_event_id.as_deref(), Some("evt_1"));
}

#[tokio::test]
async fn stale_payments_signature_is_rejected() {
    let h = Harness::new();
    let integration = h.connect(Platform::Payments).await;
    let signed_at = start() - ChronoDuration::minutes(10);
    let body = payment_succeeded("evt_2", 1000, signed_at.timestamp());

    let outcome = h
        .pipeline
        .handle_delivery(
            Platform::Payments,
            integration.id,
            &body,
            &payments_headers(&body, signed_at),
        )
        .await;
    assert_eq!(
        outcome,
        DeliveryOutcome::Unauthorized(SignatureError::TimestampOutsideTolerance {
            skew_secs: 600
        })
    );

    let events = h.events(integration.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].topic, bizpulse::UNKNOWN_TOPIC);
    assert!(h.points(integration.id).await.is_empty());
}

#[tokio::test]
async fn deliveries_need_a_connected_integration_on_the_same_platform() {
    let h = Harness::new();
    let commerce = h.connect(Platform::Commerce).await;
    let body = paid_order(1005, "10.00");
    let headers = commerce_headers(&body, "orders/paid");

    let unknown = h
        .pipeline
        .handle_delivery(Platform::Commerce, Uuid::new_v4(), &body, &headers)
        .await;
    assert_eq!(unknown, DeliveryOutcome::UnknownIntegration);

    let payment = payment_succeeded("evt_3", 500, start().timestamp());
    let wrong_platform = h
        .pipeline
        .handle_delivery(
            Platform::Payments,
            commerce.id,
            &payment,
            &payments_headers(&payment, start()),
        )
        .await;
    assert_eq!(wrong_platform, DeliveryOutcome::UnknownIntegration);

    h.stores
        .integrations
        .disconnect_integration(commerce.id, start())
        .await
        .unwrap();
    let disconnected = h
        .pipeline
        .handle_delivery(Platform::Commerce, commerce.id, &body, &headers)
        .await;
    assert_eq!(disconnected, DeliveryOutcome::UnknownIntegration);
    assert_eq!(disconnected.status_code(), http::StatusCode::NOT_FOUND);

    let ads = h
        .pipeline
        .handle_delivery(Platform::Ads, commerce.id, &body, &HeaderMap::new())
        .await;
    assert_eq!(ads, DeliveryOutcome::UnsupportedPlatform);

    assert!(h.events(commerce.id).await.is_empty());
}

/// Signed commerce headers for `body` as sent from `ip`.
fn commerce_from(ip: &'static str, body: &[u8]) -> HeaderMap {
    let mut headers = commerce_headers(body, "orders/paid");
    headers.insert("x-forwarded-for", HeaderValue::from_static(ip));
    headers
}

fn webhook_limit(max: u32) -> RateLimitSettings {
    RateLimitSettings {
        webhook: RateLimitConfig::new(max, Duration::from_secs(60))
            .with_failure_policy(FailurePolicy::FailClosed),
        ..RateLimitSettings::default()
    }
}

#[tokio::test]
async fn webhook_limit_applies_per_integration_window() {
    let h = Harness::with_settings(webhook_limit(2));
    let integration = h.connect(Platform::Commerce).await;

    let deliver = |order: u64, ip: &'static str| {
        let body = paid_order(order, "10.00");
        let headers = commerce_from(ip, &body);
        let pipeline = h.pipeline.clone();
        let id = integration.id;
        async move {
            pipeline
                .handle_delivery(Platform::Commerce, id, &body, &headers)
                .await
        }
    };

    assert!(deliver(1, "198.51.100.1").await.is_success());
    assert!(deliver(2, "198.51.100.2").await.is_success());

    // A new sender address does not refill the integration's window.
    let limited = deliver(3, "198.51.100.3").await;
    let retry = limited.retry_after_secs().unwrap();
    assert!((1..=60).contains(&retry), "retry_after {retry}");
    assert_eq!(limited.status_code(), http::StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(h.events(integration.id).await.len(), 2);

    // Another integration has its own budget.
    let other = h.connect(Platform::Payments).await;
    let body = payment_succeeded("evt_4", 100, start().timestamp());
    let mut headers = payments_headers(&body, start());
    headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.4"));
    let outcome = h
        .pipeline
        .handle_delivery(Platform::Payments, other.id, &body, &headers)
        .await;
    assert!(outcome.is_success());

    h.clock.advance(Duration::from_secs(60));
    assert!(deliver(3, "198.51.100.3").await.is_success());
    assert_eq!(h.events(integration.id).await.len(), 3);
}

#[tokio::test]
async fn forged_deliveries_cannot_spend_an_integration_budget() {
    let h = Harness::with_settings(webhook_limit(2));
    let integration = h.connect(Platform::Commerce).await;
    let signed = paid_order(1100, "10.00");
    let forged_body = paid_order(1100, "999.00");

    let mut forged = Vec::new();
    for _ in 0..5 {
        let outcome = h
            .pipeline
            .handle_delivery(
                Platform::Commerce,
                integration.id,
                &forged_body,
                &commerce_from("203.0.113.9", &signed),
            )
            .await;
        forged.push(outcome);
    }
    assert_eq!(forged[0], DeliveryOutcome::Unauthorized(SignatureError::Mismatch));
    assert_eq!(forged[1], DeliveryOutcome::Unauthorized(SignatureError::Mismatch));
    assert!(
        forged[2..]
            .iter()
            .all(|o| matches!(o, DeliveryOutcome::RateLimited { .. })),
        "outcomes: {forged:?}"
    );

    for order in [1101, 1102] {
        let body = paid_order(order, "10.00");
        let outcome = h
            .pipeline
            .handle_delivery(
                Platform::Commerce,
                integration.id,
                &body,
                &commerce_from("198.51.100.1", &body),
            )
            .await;
        assert!(outcome.is_success(), "genuine delivery got {outcome:?}");
    }

    let processed = h
        .events(integration.id)
        .await
        .into_iter()
        .filter(|e| e.status == WebhookStatus::Processed)
        .count();
    assert_eq!(processed, 2);
}

#[tokio::test]
async fn abandoned_claim_is_reprocessed_after_its_lease() {
    let h = Harness::new();
    let integration = h.connect(Platform::Commerce).await;
    let body = paid_order(1007, "15.00");
    let headers = commerce_headers(&body, "orders/paid");

    // An earlier attempt claimed the delivery and never settled it.
    let key = DeliveryKey::new(integration.id, "orders/paid", Some("1007".into()));
    let lease = ChronoDuration::seconds(IngestConfig::default().claim_lease_secs as i64);
    let abandoned = h
        .stores
        .events
        .claim_delivery(&key, start(), lease)
        .await
        .unwrap()
        .event_id();

    let early = h
        .pipeline
        .handle_delivery(Platform::Commerce, integration.id, &body, &headers)
        .await;
    assert_eq!(early, DeliveryOutcome::InProgress { event_id: abandoned });
    assert_eq!(early.status_code(), http::StatusCode::CONFLICT);
    assert!(h.points(integration.id).await.is_empty());

    h.clock.advance(Duration::from_secs(IngestConfig::default().claim_lease_secs));
    let late = h
        .pipeline
        .handle_delivery(Platform::Commerce, integration.id, &body, &headers)
        .await;
    let (event_id, appended) = processed(late);
    assert_eq!(event_id, abandoned);
    assert_eq!(appended, 2);

    let events = h.events(integration.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, WebhookStatus::Processed);
    assert_eq!(events[0].attempts, 3);
}

struct FailingPoints;

#[async_trait]
impl DataPointStore for FailingPoints {
    async fn append_points(&self, _points: Vec<DataPoint>) -> Result<usize, StoreError> {
        Err(StoreError::unavailable("disk full"))
    }

    async fn sum(
        &self,
        _integration_ids: &[IntegrationId],
        _metric: MetricType,
        _window: Window,
    ) -> Result<f64, StoreError> {
        Ok(0.0)
    }

    async fn query_points(
        &self,
        _integration_ids: &[IntegrationId],
        _metric: Option<MetricType>,
        _window: Window,
    ) -> Result<Vec<DataPoint>, StoreError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn failed_append_is_retried_under_the_same_record() {
    let h = Harness::new();
    let integration = h.connect(Platform::Commerce).await;
    let body = paid_order(1006, "42.00");
    let headers = commerce_headers(&body, "orders/paid");

    let broken = h.pipeline_over(
        Stores::from_backend(h.backend.clone()).with_points(Arc::new(FailingPoints)),
    );
    let failed = broken
        .handle_delivery(Platform::Commerce, integration.id, &body, &headers)
        .await;
    assert!(matches!(failed, DeliveryOutcome::PersistenceFailed(_)));
    assert_eq!(failed.status_code(), http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(failed.message(), "delivery could not be stored");

    let events = h.events(integration.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, WebhookStatus::Failed);
    assert!(events[0].error.as_deref().unwrap().contains("disk full"));
    let failed_id = events[0].id;

    let retried = h
        .pipeline
        .handle_delivery(Platform::Commerce, integration.id, &body, &headers)
        .await;
    let (event_id, appended) = processed(retried);
    assert_eq!(event_id, failed_id);
    assert_eq!(appended, 2);

    let events = h.events(integration.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, WebhookStatus::Processed);
    assert_eq!(events[0].attempts, 2);
}

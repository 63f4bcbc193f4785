//! Shared fixtures for the bizpulse integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bizpulse::ingest::COMMERCE_TOPIC_HEADER;
use bizpulse::ingest::signature::{self, COMMERCE_SIGNATURE_HEADER, PAYMENTS_SIGNATURE_HEADER};
use bizpulse::ratelimit::MemoryCounterStore;
use bizpulse::{
    Clock, DataPoint, IngestConfig, Integration, IntegrationId, ManualClock, MemoryStore,
    NewIntegration, PipelineConfig, Platform, RateLimitSettings, RateLimiters, Stores,
    WebhookEvent, WebhookPipeline, WebhookSecrets, Window,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use http::{HeaderMap, HeaderValue};
use serde_json::json;

pub const COMMERCE_SECRET: &str = "commerce-test-secret";
pub const PAYMENTS_SECRET: &str = "payments-test-secret";
pub const ORGANIZATION: &str = "org-acme";

/// Minute-aligned start time for every test clock.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// The day around [`start`], wide enough to hold every fixture timestamp.
pub fn day_window() -> Window {
    Window::trailing_days(start() + Duration::hours(6), 1).unwrap()
}

pub fn secrets() -> WebhookSecrets {
    WebhookSecrets {
        commerce_secret: Some(COMMERCE_SECRET.to_string()),
        payments_secret: Some(PAYMENTS_SECRET.to_string()),
    }
}

/// A pipeline over a memory backend and a manual clock.
pub struct Harness {
    pub backend: Arc<MemoryStore>,
    pub stores: Stores,
    pub clock: Arc<ManualClock>,
    pub pipeline: WebhookPipeline,
    settings: RateLimitSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(RateLimitSettings::default())
    }

    pub fn with_settings(settings: RateLimitSettings) -> Self {
        let backend = Arc::new(MemoryStore::new());
        let stores = Stores::from_backend(backend.clone());
        let clock = Arc::new(ManualClock::new(start()));
        let pipeline = build_pipeline(stores.clone(), &settings, clock.clone());
        Self {
            backend,
            stores,
            clock,
            pipeline,
            settings,
        }
    }

    /// A second pipeline over `stores`, sharing this harness's clock.
    pub fn pipeline_over(&self, stores: Stores) -> WebhookPipeline {
        build_pipeline(stores, &self.settings, self.clock.clone())
    }

    pub async fn connect(&self, platform: Platform) -> Integration {
        self.stores
            .integrations
            .upsert_integration(
                NewIntegration {
                    organization_id: ORGANIZATION.to_string(),
                    platform,
                    external_account_id: format!("{platform}-account"),
                    credentials: None,
                },
                self.clock.now(),
            )
            .await
            .unwrap()
    }

    pub async fn points(&self, integration_id: IntegrationId) -> Vec<DataPoint> {
        self.stores
            .points
            .query_points(&[integration_id], None, day_window())
            .await
            .unwrap()
    }

    pub async fn events(&self, integration_id: IntegrationId) -> Vec<WebhookEvent> {
        self.stores
            .events
            .events_for_integration(integration_id)
            .await
            .unwrap()
    }
}

fn build_pipeline(
    stores: Stores,
    settings: &RateLimitSettings,
    clock: Arc<ManualClock>,
) -> WebhookPipeline {
    let clock: Arc<dyn Clock> = clock;
    let limiters = RateLimiters::new(
        settings,
        Arc::new(MemoryCounterStore::new()),
        Arc::clone(&clock),
    )
    .unwrap();
    WebhookPipeline::new(
        stores,
        Arc::new(limiters),
        PipelineConfig::new(IngestConfig::default(), secrets()),
        clock,
    )
    .unwrap()
}

pub fn paid_order(id: u64, total: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": id,
        "total_price": total,
        "currency": "USD",
        "created_at": "2026-03-01T10:30:00Z",
        "processed_at": "2026-03-01T11:00:00Z",
    }))
    .unwrap()
}

pub fn payment_succeeded(event_id: &str, amount_cents: i64, created: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": event_id,
        "type": "payment_intent.succeeded",
        "created": created,
        "data": {
            "object": {
                "id": format!("pi_{event_id}"),
                "amount_received": amount_cents,
                "currency": "usd",
                "created": created,
            }
        }
    }))
    .unwrap()
}

/// Topic and valid signature for a commerce delivery of `body`.
pub fn commerce_headers(body: &[u8], topic: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(COMMERCE_TOPIC_HEADER, HeaderValue::from_str(topic).unwrap());
    let sig = signature::sign_commerce(body, COMMERCE_SECRET.as_bytes()).unwrap();
    headers.insert(
        COMMERCE_SIGNATURE_HEADER,
        HeaderValue::from_str(&sig).unwrap(),
    );
    headers
}

/// Valid payments signature for `body`, timestamped `signed_at`.
pub fn payments_headers(body: &[u8], signed_at: DateTime<Utc>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let sig =
        signature::sign_payments(body, PAYMENTS_SECRET.as_bytes(), signed_at.timestamp()).unwrap();
    headers.insert(
        PAYMENTS_SIGNATURE_HEADER,
        HeaderValue::from_str(&sig).unwrap(),
    );
    headers
}

//! Per-platform webhook strategies.
//!
//! Each platform that pushes webhooks implements [`WebhookAdapter`]: how to
//! authenticate a delivery, where its topic and event id live, and how its
//! payloads map onto [`DataPoint`]s. [`webhook_adapter`] is the closed table
//! keyed by [`Platform`]; adding a platform means adding one arm there.
use chrono::{DateTime, Utc};
use http::HeaderMap;
use model::{DataPoint, IntegrationId, MetricType, Platform};
use serde_json::Value;
use tracing::warn;

use crate::config::IngestConfig;
use crate::error::SignatureError;

mod commerce;
mod payments;

pub use commerce::{CommerceAdapter, COMMERCE_TOPIC_HEADER, COMMERCE_WEBHOOK_ID_HEADER};
pub use payments::PaymentsAdapter;

/// Inputs shared by every extraction call.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub integration_id: IntegrationId,
    pub topic: &'a str,
    /// Fallback business time when the payload carries none.
    pub received_at: DateTime<Utc>,
    pub config: &'a IngestConfig,
}

/// Verification and extraction capability of one platform.
pub trait WebhookAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Authenticates the raw body. Pure: no I/O, `now` injected.
    fn verify(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        secret: &[u8],
        now: DateTime<Utc>,
        config: &IngestConfig,
    ) -> Result<(), SignatureError>;

    /// Topic named before the body is parsed, if the scheme puts it in a header.
    fn header_topic(&self, headers: &HeaderMap) -> Option<String>;

    /// Event type of a parsed delivery.
    fn topic(&self, headers: &HeaderMap, payload: &Value) -> Option<String>;

    /// Identifier used to detect re-delivery.
    fn external_event_id(&self, headers: &HeaderMap, payload: &Value) -> Option<String>;

    /// Maps a verified payload to observations. Total: unknown topics and
    /// unusable fields yield fewer points, never an error.
    fn extract(&self, ctx: &ExtractContext<'_>, payload: &Value) -> Vec<DataPoint>;
}

static COMMERCE: CommerceAdapter = CommerceAdapter;
static PAYMENTS: PaymentsAdapter = PaymentsAdapter;

/// Strategy for `platform`, or `None` when it does not push webhooks.
pub fn webhook_adapter(platform: Platform) -> Option<&'static dyn WebhookAdapter> {
    match platform {
        Platform::Commerce => Some(&COMMERCE),
        Platform::Payments => Some(&PAYMENTS),
        Platform::WebAnalytics | Platform::Ads | Platform::EmailMarketing => None,
    }
}

pub(crate) fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Decimal amount given as a JSON number or a numeric string.
pub(crate) fn decimal(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Amount in minor units (cents) converted to major units.
pub(crate) fn minor_units(value: Option<&Value>) -> Option<f64> {
    let Value::Number(n) = value? else {
        return None;
    };
    n.as_i64()
        .map(|v| v as f64)
        .or_else(|| n.as_f64())
        .map(|v| v / 100.0)
}

pub(crate) fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn currency(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_ascii_uppercase)
}

pub(crate) fn rfc3339(value: Option<&Value>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value?.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

pub(crate) fn unix_seconds(value: Option<&Value>) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value?.as_i64()?, 0)
}

/// Builds one observation, logging and dropping it if it breaks an invariant.
pub(crate) fn observation(
    ctx: &ExtractContext<'_>,
    metric: MetricType,
    value: f64,
    metadata: Value,
    occurred_at: DateTime<Utc>,
) -> Option<DataPoint> {
    match DataPoint::new(ctx.integration_id, metric, value, metadata, occurred_at) {
        Ok(point) => Some(point),
        Err(err) => {
            warn!(
                integration_id = %ctx.integration_id,
                topic = ctx.topic,
                metric = %metric,
                error = %err,
                "extract_skipped_observation"
            );
            None
        }
    }
}

//! Bizpulse Ingest Layer
//!
//! This is where platform webhooks enter the pipeline. We take the raw body
//! exactly as it arrived, prove it came from the platform, and turn it into
//! [`DataPoint`]s the aggregation engine can sum.
//!
//! ## What we do here
//!
//! - **Verify signatures** - HMAC-SHA256 in two flavours: a base64 header over
//!   the raw body (commerce) and a timestamped `t=...,v1=...` header with
//!   replay tolerance (payments). Comparisons are constant time.
//! - **Read the envelope** - Topic and external event id, wherever each
//!   platform keeps them, so the caller can deduplicate re-deliveries.
//! - **Extract observations** - A total mapping from (platform, topic,
//!   payload) to data points. Unknown topics produce nothing, bad amounts are
//!   skipped with a warning, nothing here fails a delivery.
//!
//! Nothing in this crate does I/O or reads the clock; `now` is always passed
//! in.
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use http::{HeaderMap, HeaderValue};
//! use ingest::{extract, open_delivery, signature, webhook_adapter, ExtractContext, IngestConfig};
//! use model::{MetricType, Platform};
//! use uuid::Uuid;
//!
//! let secret = b"whsec";
//! let body = br#"{"id":1,"total_price":"100.00","currency":"USD"}"#;
//!
//! let mut headers = HeaderMap::new();
//! headers.insert("x-commerce-topic", HeaderValue::from_static("orders/paid"));
//! let sig = signature::sign_commerce(body, secret).unwrap();
//! headers.insert("x-commerce-hmac-sha256", HeaderValue::from_str(&sig).unwrap());
//!
//! let config = IngestConfig::default();
//! let adapter = webhook_adapter(Platform::Commerce).unwrap();
//! let now = Utc::now();
//! let delivery = open_delivery(adapter, body, &headers, secret, now, &config).unwrap();
//!
//! let ctx = ExtractContext {
//!     integration_id: Uuid::new_v4(),
//!     topic: &delivery.topic,
//!     received_at: now,
//!     config: &config,
//! };
//! let points = extract(Platform::Commerce, &ctx, &delivery.payload).unwrap();
//! assert_eq!(points[0].metric, MetricType::Revenue);
//! assert_eq!(points[0].value, 100.0);
//! ```
use std::time::Instant;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use model::{DataPoint, Platform};
use serde_json::Value;
use tracing::{debug, warn, Level};

mod config;
mod error;
mod platform;
pub mod signature;

pub use crate::config::{ConfigError, IngestConfig, OrderRecognition};
pub use crate::error::{EventError, ExtractError, SignatureError};
pub use crate::platform::{
    webhook_adapter, CommerceAdapter, ExtractContext, PaymentsAdapter, WebhookAdapter,
    COMMERCE_TOPIC_HEADER, COMMERCE_WEBHOOK_ID_HEADER,
};

/// A delivery that passed verification and parsed as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedDelivery {
    pub topic: String,
    pub external_event_id: Option<String>,
    pub payload: Value,
}

/// Verifies `body`, parses it, and reads the envelope.
///
/// The body is parsed only after the signature holds. Every failure is
/// typed so the caller can record why the delivery was rejected.
pub fn open_delivery(
    adapter: &dyn WebhookAdapter,
    body: &[u8],
    headers: &HeaderMap,
    secret: &[u8],
    now: DateTime<Utc>,
    config: &IngestConfig,
) -> Result<VerifiedDelivery, EventError> {
    let span = tracing::span!(
        Level::DEBUG,
        "ingest.open_delivery",
        platform = %adapter.platform(),
        body_len = body.len()
    );
    let _guard = span.enter();

    if let Err(err) = adapter.verify(body, headers, secret, now, config) {
        warn!(kind = err.kind(), error = %err, "signature_rejected");
        return Err(err.into());
    }

    let payload: Value =
        serde_json::from_slice(body).map_err(|e| EventError::InvalidJson(e.to_string()))?;
    let topic = adapter
        .topic(headers, &payload)
        .ok_or(EventError::MissingTopic)?;
    let external_event_id = adapter.external_event_id(headers, &payload);

    Ok(VerifiedDelivery {
        topic,
        external_event_id,
        payload,
    })
}

/// Maps a verified payload to observations for `platform`.
pub fn extract(
    platform: Platform,
    ctx: &ExtractContext<'_>,
    payload: &Value,
) -> Result<Vec<DataPoint>, ExtractError> {
    let start = Instant::now();
    let adapter = webhook_adapter(platform).ok_or(ExtractError::UnsupportedPlatform(platform))?;
    let points = adapter.extract(ctx, payload);

    let elapsed_micros = start.elapsed().as_micros();
    debug!(
        platform = %platform,
        topic = ctx.topic,
        integration_id = %ctx.integration_id,
        points = points.len(),
        elapsed_micros,
        "extract_complete"
    );
    Ok(points)
}

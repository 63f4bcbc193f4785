//! Commerce platform: base64 HMAC header, topic in a header, order payloads.
use chrono::{DateTime, Utc};
use http::HeaderMap;
use model::{DataPoint, MetricType, Platform};
use serde_json::{json, Value};
use tracing::warn;

use super::{currency, decimal, header, id_string, observation, rfc3339, ExtractContext, WebhookAdapter};
use crate::config::IngestConfig;
use crate::error::SignatureError;
use crate::signature::{verify_commerce, COMMERCE_SIGNATURE_HEADER};

pub const COMMERCE_TOPIC_HEADER: &str = "x-commerce-topic";
pub const COMMERCE_WEBHOOK_ID_HEADER: &str = "x-commerce-webhook-id";

const CUSTOMERS_CREATE: &str = "customers/create";
const REFUNDS_CREATE: &str = "refunds/create";

#[derive(Debug, Clone, Copy, Default)]
pub struct CommerceAdapter;

impl WebhookAdapter for CommerceAdapter {
    fn platform(&self) -> Platform {
        Platform::Commerce
    }

    fn verify(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        secret: &[u8],
        _now: DateTime<Utc>,
        _config: &IngestConfig,
    ) -> Result<(), SignatureError> {
        verify_commerce(body, header(headers, COMMERCE_SIGNATURE_HEADER), secret)
    }

    fn header_topic(&self, headers: &HeaderMap) -> Option<String> {
        header(headers, COMMERCE_TOPIC_HEADER).map(str::to_string)
    }

    fn topic(&self, headers: &HeaderMap, _payload: &Value) -> Option<String> {
        self.header_topic(headers)
    }

    fn external_event_id(&self, headers: &HeaderMap, payload: &Value) -> Option<String> {
        id_string(payload.get("id"))
            .or_else(|| header(headers, COMMERCE_WEBHOOK_ID_HEADER).map(str::to_string))
    }

    fn extract(&self, ctx: &ExtractContext<'_>, payload: &Value) -> Vec<DataPoint> {
        let topic = ctx.topic;
        if topic == ctx.config.commerce_order_topic.topic() {
            order(ctx, payload)
        } else if topic == CUSTOMERS_CREATE {
            let at = business_time(ctx, payload);
            observation(ctx, MetricType::Customers, 1.0, source_metadata(ctx, payload), at)
                .into_iter()
                .collect()
        } else if topic == REFUNDS_CREATE {
            refund(ctx, payload)
        } else {
            Vec::new()
        }
    }
}

/// `processed_at`, then `created_at`, then delivery time.
fn business_time(ctx: &ExtractContext<'_>, payload: &Value) -> DateTime<Utc> {
    rfc3339(payload.get("processed_at"))
        .or_else(|| rfc3339(payload.get("created_at")))
        .unwrap_or(ctx.received_at)
}

fn source_metadata(ctx: &ExtractContext<'_>, payload: &Value) -> Value {
    json!({
        "source": "webhook",
        "topic": ctx.topic,
        "external_id": id_string(payload.get("id")),
    })
}

fn order(ctx: &ExtractContext<'_>, payload: &Value) -> Vec<DataPoint> {
    let at = business_time(ctx, payload);
    let order_id = id_string(payload.get("id"));
    let mut points = Vec::with_capacity(2);

    match (decimal(payload.get("total_price")), currency(payload.get("currency"))) {
        (Some(total), Some(code)) => {
            let metadata = json!({
                "currency": code,
                "order_id": order_id,
                "source": "webhook",
                "topic": ctx.topic,
            });
            points.extend(observation(ctx, MetricType::Revenue, total, metadata, at));
        }
        (total, code) => warn!(
            integration_id = %ctx.integration_id,
            topic = ctx.topic,
            has_total = total.is_some(),
            has_currency = code.is_some(),
            "extract_order_revenue_skipped"
        ),
    }

    let metadata = json!({
        "order_id": order_id,
        "source": "webhook",
        "topic": ctx.topic,
    });
    points.extend(observation(ctx, MetricType::Orders, 1.0, metadata, at));
    points
}

fn refund(ctx: &ExtractContext<'_>, payload: &Value) -> Vec<DataPoint> {
    let transactions = payload
        .get("transactions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut total = 0.0;
    let mut code = None;
    for tx in transactions {
        match decimal(tx.get("amount")) {
            Some(amount) if amount >= 0.0 => total += amount,
            _ => {
                warn!(
                    integration_id = %ctx.integration_id,
                    topic = ctx.topic,
                    "extract_refund_transaction_skipped"
                );
                continue;
            }
        }
        code = code.or_else(|| currency(tx.get("currency")));
    }
    let code = code.or_else(|| currency(payload.get("currency")));

    if total <= 0.0 {
        return Vec::new();
    }
    let Some(code) = code else {
        warn!(
            integration_id = %ctx.integration_id,
            topic = ctx.topic,
            "extract_refund_currency_missing"
        );
        return Vec::new();
    };

    let metadata = json!({
        "currency": code,
        "order_id": id_string(payload.get("order_id")),
        "refund_id": id_string(payload.get("id")),
        "source": "webhook",
        "topic": ctx.topic,
    });
    let at = business_time(ctx, payload);
    observation(ctx, MetricType::Refunds, total, metadata, at)
        .into_iter()
        .collect()
}

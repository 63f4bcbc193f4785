//! Payments platform: timestamped signature header, event envelope with
//! `type` and `data.object`, amounts in minor units.
use chrono::{DateTime, Utc};
use http::HeaderMap;
use model::{DataPoint, MetricType, Platform};
use serde_json::{json, Value};
use tracing::warn;

use super::{currency, header, id_string, minor_units, observation, unix_seconds, ExtractContext, WebhookAdapter};
use crate::config::IngestConfig;
use crate::error::SignatureError;
use crate::signature::{verify_payments, PAYMENTS_SIGNATURE_HEADER};

const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
const CHARGE_REFUNDED: &str = "charge.refunded";
const CUSTOMER_CREATED: &str = "customer.created";

#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentsAdapter;

impl WebhookAdapter for PaymentsAdapter {
    fn platform(&self) -> Platform {
        Platform::Payments
    }

    fn verify(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        secret: &[u8],
        now: DateTime<Utc>,
        config: &IngestConfig,
    ) -> Result<(), SignatureError> {
        verify_payments(
            body,
            header(headers, PAYMENTS_SIGNATURE_HEADER),
            secret,
            now,
            config.signature_tolerance(),
        )
    }

    fn header_topic(&self, _headers: &HeaderMap) -> Option<String> {
        None
    }

    fn topic(&self, _headers: &HeaderMap, payload: &Value) -> Option<String> {
        payload
            .get("type")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    fn external_event_id(&self, _headers: &HeaderMap, payload: &Value) -> Option<String> {
        id_string(payload.get("id"))
    }

    fn extract(&self, ctx: &ExtractContext<'_>, payload: &Value) -> Vec<DataPoint> {
        let object = payload.pointer("/data/object").unwrap_or(&Value::Null);
        let event_time = unix_seconds(payload.get("created")).unwrap_or(ctx.received_at);

        match ctx.topic {
            PAYMENT_SUCCEEDED => payment(ctx, object, event_time),
            CHARGE_REFUNDED => {
                let Some(amount) = minor_units(object.get("amount_refunded")) else {
                    warn!(
                        integration_id = %ctx.integration_id,
                        topic = ctx.topic,
                        "extract_refund_amount_missing"
                    );
                    return Vec::new();
                };
                let metadata = json!({
                    "currency": currency(object.get("currency")),
                    "charge_id": id_string(object.get("id")),
                    "payment_id": id_string(object.get("payment_intent")),
                    "source": "webhook",
                    "topic": ctx.topic,
                });
                observation(ctx, MetricType::Refunds, amount, metadata, event_time)
                    .into_iter()
                    .collect()
            }
            CUSTOMER_CREATED => {
                let metadata = json!({
                    "customer_id": id_string(object.get("id")),
                    "source": "webhook",
                    "topic": ctx.topic,
                });
                observation(ctx, MetricType::Customers, 1.0, metadata, event_time)
                    .into_iter()
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

fn payment(ctx: &ExtractContext<'_>, object: &Value, event_time: DateTime<Utc>) -> Vec<DataPoint> {
    let at = unix_seconds(object.get("created")).unwrap_or(event_time);
    let payment_id = id_string(object.get("id"));
    let mut points = Vec::with_capacity(2);

    let amount = minor_units(object.get("amount_received"))
        .or_else(|| minor_units(object.get("amount")));
    match amount {
        Some(amount) => {
            let metadata = json!({
                "currency": currency(object.get("currency")),
                "payment_id": payment_id,
                "source": "webhook",
                "topic": ctx.topic,
            });
            points.extend(observation(ctx, MetricType::Revenue, amount, metadata, at));
        }
        None => warn!(
            integration_id = %ctx.integration_id,
            topic = ctx.topic,
            "extract_payment_amount_missing"
        ),
    }

    if ctx.config.count_payments_as_orders {
        let metadata = json!({
            "payment_id": payment_id,
            "source": "webhook",
            "topic": ctx.topic,
        });
        points.extend(observation(ctx, MetricType::Orders, 1.0, metadata, at));
    }
    points
}

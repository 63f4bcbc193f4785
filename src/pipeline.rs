//! Webhook delivery pipeline: limit, verify, claim, extract, persist.
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
use ingest::{
    EventError, ExtractContext, SignatureError, VerifiedDelivery, WebhookAdapter, open_delivery,
    webhook_adapter,
};
use model::{DeliveryKey, IntegrationId, Platform, WebhookStatus};
use ratelimit::{Clock, LimiterClass, RateLimiters, client_ip};
use store::{Claim, Stores};
use tracing::{Instrument, Level, debug, error, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// Topic recorded for rejections whose topic could not be read.
pub const UNKNOWN_TOPIC: &str = "unknown";

/// How one delivery ended. Every variant maps to an HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Observations were stored and the delivery marked processed.
    Processed { event_id: Uuid, points: usize },
    /// The same delivery was processed before. Nothing was re-applied.
    Duplicate { event_id: Uuid },
    RateLimited { retry_after_secs: u64 },
    /// No connected integration with this id on this platform.
    UnknownIntegration,
    /// The platform does not deliver webhooks.
    UnsupportedPlatform,
    Unauthorized(SignatureError),
    BadRequest(String),
    /// Another attempt of the same delivery holds the claim.
    InProgress { event_id: Uuid },
    PersistenceFailed(String),
}

impl DeliveryOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DeliveryOutcome::Processed { .. } | DeliveryOutcome::Duplicate { .. } => StatusCode::OK,
            DeliveryOutcome::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            DeliveryOutcome::UnknownIntegration | DeliveryOutcome::UnsupportedPlatform => {
                StatusCode::NOT_FOUND
            }
            DeliveryOutcome::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DeliveryOutcome::BadRequest(_) => StatusCode::BAD_REQUEST,
            DeliveryOutcome::InProgress { .. } => StatusCode::CONFLICT,
            DeliveryOutcome::PersistenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable snake_case name, used as the `outcome` metric label.
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Processed { .. } => "processed",
            DeliveryOutcome::Duplicate { .. } => "duplicate",
            DeliveryOutcome::RateLimited { .. } => "rate_limited",
            DeliveryOutcome::UnknownIntegration => "unknown_integration",
            DeliveryOutcome::UnsupportedPlatform => "unsupported_platform",
            DeliveryOutcome::Unauthorized(_) => "unauthorized",
            DeliveryOutcome::BadRequest(_) => "bad_request",
            DeliveryOutcome::InProgress { .. } => "in_progress",
            DeliveryOutcome::PersistenceFailed(_) => "persistence_failed",
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code().is_success()
    }

    /// Seconds the caller should wait, for rate-limited deliveries.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            DeliveryOutcome::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Human-readable detail for the response body.
    pub fn message(&self) -> String {
        match self {
            DeliveryOutcome::Processed { points, .. } => format!("processed {points} observations"),
            DeliveryOutcome::Duplicate { .. } => "delivery already processed".to_string(),
            DeliveryOutcome::RateLimited { retry_after_secs } => {
                format!("rate limit exceeded, retry in {retry_after_secs}s")
            }
            DeliveryOutcome::UnknownIntegration => "integration not found".to_string(),
            DeliveryOutcome::UnsupportedPlatform => "platform does not deliver webhooks".to_string(),
            DeliveryOutcome::Unauthorized(err) => err.to_string(),
            DeliveryOutcome::BadRequest(detail) => detail.clone(),
            DeliveryOutcome::InProgress { .. } => "delivery is being processed".to_string(),
            DeliveryOutcome::PersistenceFailed(_) => "delivery could not be stored".to_string(),
        }
    }

    /// Id of the webhook event record, when one was claimed.
    pub fn event_id(&self) -> Option<Uuid> {
        match self {
            DeliveryOutcome::Processed { event_id, .. }
            | DeliveryOutcome::Duplicate { event_id }
            | DeliveryOutcome::InProgress { event_id } => Some(*event_id),
            _ => None,
        }
    }
}

/// Request-scoped webhook handling over shared stores and limiters.
#[derive(Clone)]
pub struct WebhookPipeline {
    stores: Stores,
    limiters: Arc<RateLimiters>,
    config: Arc<PipelineConfig>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for WebhookPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WebhookPipeline {
    pub fn new(
        stores: Stores,
        limiters: Arc<RateLimiters>,
        config: PipelineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            stores,
            limiters,
            config: Arc::new(config),
            clock,
        })
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn limiters(&self) -> &RateLimiters {
        &self.limiters
    }

    /// Handles one raw delivery end to end.
    ///
    /// The body must be the bytes exactly as received; signatures are
    /// computed over them before anything is parsed.
    pub async fn handle_delivery(
        &self,
        platform: Platform,
        integration_id: IntegrationId,
        raw_body: &[u8],
        headers: &HeaderMap,
    ) -> DeliveryOutcome {
        let started = Instant::now();
        let span = tracing::span!(
            Level::INFO,
            "webhook.deliver",
            platform = %platform,
            integration_id = %integration_id,
            body_len = raw_body.len()
        );

        let outcome = self
            .deliver(platform, integration_id, raw_body, headers)
            .instrument(span.clone())
            .await;

        let elapsed = started.elapsed();
        metrics::counter!(
            "webhook_deliveries_total",
            "platform" => platform.as_str(),
            "outcome" => outcome.label()
        )
        .increment(1);
        metrics::histogram!("webhook_latency_seconds").record(elapsed.as_secs_f64());

        let _guard = span.enter();
        log_outcome(platform, integration_id, &outcome, elapsed.as_micros());
        outcome
    }

    async fn deliver(
        &self,
        platform: Platform,
        integration_id: IntegrationId,
        raw_body: &[u8],
        headers: &HeaderMap,
    ) -> DeliveryOutcome {
        // Unauthenticated traffic counts against its sender only.
        if let Some(limited) = self.limit(&format!("ip:{}", client_ip(headers))) {
            return limited;
        }

        let Some(adapter) = webhook_adapter(platform) else {
            return DeliveryOutcome::UnsupportedPlatform;
        };

        match self.stores.integrations.integration(integration_id).await {
            Ok(Some(integration))
                if integration.platform == platform && integration.is_connected() => {}
            Ok(_) => return DeliveryOutcome::UnknownIntegration,
            Err(err) => return DeliveryOutcome::PersistenceFailed(err.to_string()),
        }

        let now = self.clock.now();
        let secret = self.config.webhooks.secret_for(platform).unwrap_or_default();
        let opened = open_delivery(adapter, raw_body, headers, secret, now, &self.config.ingest);
        let delivery = match opened {
            Ok(delivery) => delivery,
            Err(err) => return self.reject(adapter, integration_id, headers, err, now).await,
        };

        // The integration's own budget is spent only by signed deliveries.
        if let Some(limited) = self.limit(&format!("{platform}:{integration_id}")) {
            return limited;
        }

        let key = DeliveryKey::new(
            integration_id,
            delivery.topic.clone(),
            delivery.external_event_id.clone(),
        );
        let lease = chrono::Duration::from_std(self.config.ingest.claim_lease())
            .unwrap_or(chrono::Duration::MAX);
        let event_id = match self.stores.events.claim_delivery(&key, now, lease).await {
            Ok(Claim::Fresh(id)) | Ok(Claim::Retry(id)) => id,
            Ok(Claim::AlreadyProcessed(event_id)) => return DeliveryOutcome::Duplicate { event_id },
            Ok(Claim::InFlight(event_id)) => return DeliveryOutcome::InProgress { event_id },
            Err(err) => return DeliveryOutcome::PersistenceFailed(err.to_string()),
        };

        self.apply(adapter, integration_id, event_id, &delivery, now).await
    }

    /// Denial for `key` on the webhook limiter, if its window is spent.
    fn limit(&self, key: &str) -> Option<DeliveryOutcome> {
        let decision = self.limiters.get(LimiterClass::Webhook).check(key);
        (!decision.allowed).then(|| DeliveryOutcome::RateLimited {
            retry_after_secs: decision.retry_after_secs().unwrap_or(1),
        })
    }

    /// Extracts, appends, and settles a claimed delivery.
    async fn apply(
        &self,
        adapter: &dyn WebhookAdapter,
        integration_id: IntegrationId,
        event_id: Uuid,
        delivery: &VerifiedDelivery,
        now: DateTime<Utc>,
    ) -> DeliveryOutcome {
        let ctx = ExtractContext {
            integration_id,
            topic: &delivery.topic,
            received_at: now,
            config: &self.config.ingest,
        };
        let points = adapter.extract(&ctx, &delivery.payload);

        let appended = if points.is_empty() {
            0
        } else {
            match self.stores.points.append_points(points).await {
                Ok(n) => n,
                Err(err) => {
                    let detail = err.to_string();
                    if let Err(mark_err) = self
                        .stores
                        .events
                        .mark_failed(event_id, detail.clone(), now)
                        .await
                    {
                        error!(event_id = %event_id, error = %mark_err, "webhook_mark_failed_error");
                    }
                    return DeliveryOutcome::PersistenceFailed(detail);
                }
            }
        };
        metrics::counter!("data_points_appended_total").increment(appended as u64);

        // Points are already stored. Marking them failed would let the next
        // retry append them again at once; an unsettled claim holds retries
        // off until its lease runs out.
        if let Err(err) = self.stores.events.mark_processed(event_id, now).await {
            return DeliveryOutcome::PersistenceFailed(err.to_string());
        }
        DeliveryOutcome::Processed {
            event_id,
            points: appended,
        }
    }

    /// Records why a delivery was rejected before it could be claimed.
    async fn reject(
        &self,
        adapter: &dyn WebhookAdapter,
        integration_id: IntegrationId,
        headers: &HeaderMap,
        err: EventError,
        now: DateTime<Utc>,
    ) -> DeliveryOutcome {
        let topic = adapter
            .header_topic(headers)
            .unwrap_or_else(|| UNKNOWN_TOPIC.to_string());
        let key = DeliveryKey::new(integration_id, topic, None);
        let (status, outcome) = match err {
            EventError::Signature(sig) => (
                WebhookStatus::SignatureVerificationFailed,
                DeliveryOutcome::Unauthorized(sig),
            ),
            EventError::InvalidJson(detail) => (
                WebhookStatus::InvalidJson,
                DeliveryOutcome::BadRequest(format!("invalid JSON: {detail}")),
            ),
            other => (
                WebhookStatus::InvalidJson,
                DeliveryOutcome::BadRequest(other.to_string()),
            ),
        };

        if let Err(store_err) = self
            .stores
            .events
            .record_rejection(&key, status, outcome.message(), now)
            .await
        {
            warn!(
                integration_id = %integration_id,
                status = %status,
                error = %store_err,
                "webhook_rejection_not_recorded"
            );
        }
        outcome
    }
}

fn log_outcome(
    platform: Platform,
    integration_id: IntegrationId,
    outcome: &DeliveryOutcome,
    elapsed_micros: u128,
) {
    match outcome {
        DeliveryOutcome::Processed { event_id, points } => info!(
            platform = %platform,
            integration_id = %integration_id,
            event_id = %event_id,
            points,
            elapsed_micros,
            "webhook_processed"
        ),
        DeliveryOutcome::Duplicate { event_id } => info!(
            platform = %platform,
            integration_id = %integration_id,
            event_id = %event_id,
            "webhook_duplicate"
        ),
        DeliveryOutcome::RateLimited { retry_after_secs } => debug!(
            platform = %platform,
            integration_id = %integration_id,
            retry_after_secs,
            "webhook_rate_limited"
        ),
        DeliveryOutcome::Unauthorized(err) => warn!(
            platform = %platform,
            integration_id = %integration_id,
            kind = err.kind(),
            error = %err,
            "webhook_signature_rejected"
        ),
        DeliveryOutcome::PersistenceFailed(detail) => error!(
            platform = %platform,
            integration_id = %integration_id,
            error = %detail,
            "webhook_persistence_failed"
        ),
        other => warn!(
            platform = %platform,
            integration_id = %integration_id,
            outcome = other.label(),
            detail = %other.message(),
            "webhook_rejected"
        ),
    }
}

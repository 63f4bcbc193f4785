use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::IntegrationId;

/// Outcome recorded for one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Received,
    Processed,
    Failed,
    SignatureVerificationFailed,
    InvalidJson,
}

impl WebhookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookStatus::Received => "received",
            WebhookStatus::Processed => "processed",
            WebhookStatus::Failed => "failed",
            WebhookStatus::SignatureVerificationFailed => "signature_verification_failed",
            WebhookStatus::InvalidJson => "invalid_json",
        }
    }

    /// Terminal rejections never carry an idempotency key.
    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            WebhookStatus::SignatureVerificationFailed | WebhookStatus::InvalidJson
        )
    }
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idempotency key of a delivery: `(integration, topic, external event id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryKey {
    pub integration_id: IntegrationId,
    pub topic: String,
    /// Payloads without an id cannot be deduplicated.
    pub external_event_id: Option<String>,
}

impl DeliveryKey {
    pub fn new(
        integration_id: IntegrationId,
        topic: impl Into<String>,
        external_event_id: Option<String>,
    ) -> Self {
        Self {
            integration_id,
            topic: topic.into(),
            external_event_id,
        }
    }

    pub fn is_deduplicable(&self) -> bool {
        self.external_event_id.is_some()
    }
}

/// Audit record of one inbound delivery and its processing outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub integration_id: IntegrationId,
    pub topic: String,
    pub status: WebhookStatus,
    pub external_event_id: Option<String>,
    pub error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Deliveries that reused this record (first attempt counts as 1).
    pub attempts: u32,
}

impl WebhookEvent {
    pub fn received(key: &DeliveryKey, received_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            integration_id: key.integration_id,
            topic: key.topic.clone(),
            status: WebhookStatus::Received,
            external_event_id: key.external_event_id.clone(),
            error: None,
            received_at,
            processed_at: None,
            attempts: 1,
        }
    }

    pub fn key(&self) -> DeliveryKey {
        DeliveryKey::new(
            self.integration_id,
            self.topic.clone(),
            self.external_event_id.clone(),
        )
    }
}

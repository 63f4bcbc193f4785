use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IntegrationId, Platform};

/// Lifecycle of a connected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    /// Connected, initial sync not finished yet.
    #[default]
    Pending,
    Active,
    Error,
    /// Soft-disconnected. Historical data points keep referencing it.
    Disconnected,
}

/// A connected external account; the source of data points.
///
/// At most one integration exists per `(organization_id, platform)`; the
/// store enforces that by upserting on the pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: IntegrationId,
    pub organization_id: String,
    pub platform: Platform,
    pub external_account_id: String,
    /// Opaque credential material. Never echoed back over the API.
    #[serde(skip_serializing, default)]
    pub credentials: Option<String>,
    pub status: IntegrationStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    /// Whether deliveries and syncs should still be accepted.
    pub fn is_connected(&self) -> bool {
        self.status != IntegrationStatus::Disconnected
    }
}

/// Input of a successful connection handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIntegration {
    pub organization_id: String,
    pub platform: Platform,
    pub external_account_id: String,
    #[serde(default)]
    pub credentials: Option<String>,
}

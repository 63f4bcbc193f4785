//! Pipeline configuration: webhook secrets plus the ingest knobs.
//!
//! The server deserializes this from its own configuration layer; library
//! users build it directly.
use std::fmt;

use ingest::IngestConfig;
use model::Platform;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Shared secrets for the platforms that sign their webhooks.
///
/// A platform without a secret rejects every delivery as unauthorized.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSecrets {
    pub commerce_secret: Option<String>,
    pub payments_secret: Option<String>,
}

impl WebhookSecrets {
    /// Secret bytes for `platform`, if one is configured and non-empty.
    pub fn secret_for(&self, platform: Platform) -> Option<&[u8]> {
        let secret = match platform {
            Platform::Commerce => self.commerce_secret.as_deref(),
            Platform::Payments => self.payments_secret.as_deref(),
            Platform::WebAnalytics | Platform::Ads | Platform::EmailMarketing => None,
        };
        secret.filter(|s| !s.is_empty()).map(str::as_bytes)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        for (platform, secret) in [
            (Platform::Commerce, &self.commerce_secret),
            (Platform::Payments, &self.payments_secret),
        ] {
            if secret.as_deref().is_some_and(|s| s.trim().is_empty()) {
                return Err(PipelineError::EmptySecret(platform));
            }
        }
        Ok(())
    }
}

// Secrets must never reach the logs.
impl fmt::Debug for WebhookSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = |s: &Option<String>| s.as_ref().map(|_| "<redacted>");
        f.debug_struct("WebhookSecrets")
            .field("commerce_secret", &shown(&self.commerce_secret))
            .field("payments_secret", &shown(&self.payments_secret))
            .finish()
    }
}

/// Everything [`WebhookPipeline`](crate::WebhookPipeline) needs besides its
/// stores and limiters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ingest: IngestConfig,
    pub webhooks: WebhookSecrets,
}

impl PipelineConfig {
    pub fn new(ingest: IngestConfig, webhooks: WebhookSecrets) -> Self {
        Self { ingest, webhooks }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        self.ingest.validate()?;
        self.webhooks.validate()
    }
}

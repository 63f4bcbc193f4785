use analytics::AnalyticsError;
use ingest::ConfigError;
use model::{IntegrationId, Platform};
use ratelimit::RateLimitError;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the umbrella crate's setup and background work.
///
/// Webhook deliveries never return this: every delivery ends in a
/// [`DeliveryOutcome`](crate::DeliveryOutcome).
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("invalid ingest configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("webhook secret for `{0}` is empty")]
    EmptySecret(Platform),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    /// A historical source could not be read.
    #[error("historical source for `{platform}` failed: {message}")]
    Source { platform: Platform, message: String },

    #[error("integration `{0}` is disconnected")]
    Disconnected(IntegrationId),

    /// The sync task panicked or was cancelled by runtime shutdown.
    #[error("sync task aborted: {0}")]
    SyncAborted(String),
}

impl PipelineError {
    pub fn source_failed(platform: Platform, message: impl Into<String>) -> Self {
        PipelineError::Source {
            platform,
            message: message.into(),
        }
    }
}

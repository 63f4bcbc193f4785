//! Workspace umbrella crate for bizpulse.
//!
//! This crate stitches the stage crates together: a webhook delivery goes
//! through the rate limiter, signature verification, the idempotent event
//! log, and metric extraction in a single call to
//! [`WebhookPipeline::handle_delivery`]. Newly connected integrations are
//! backfilled by the [`SyncSupervisor`]. Aggregation and reporting live in
//! [`analytics`] and are re-exported here.
//!
//! ```
//! use std::sync::Arc;
//! use bizpulse::{
//!     DeliveryOutcome, PipelineConfig, RateLimitSettings, RateLimiters, Stores, SystemClock,
//!     WebhookPipeline,
//! };
//! use http::HeaderMap;
//! use model::Platform;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let limiters = Arc::new(RateLimiters::in_memory(&RateLimitSettings::default()).unwrap());
//! let pipeline = WebhookPipeline::new(
//!     Stores::in_memory(),
//!     limiters,
//!     PipelineConfig::default(),
//!     Arc::new(SystemClock),
//! )
//! .unwrap();
//!
//! let outcome = pipeline
//!     .handle_delivery(Platform::Commerce, uuid::Uuid::new_v4(), b"{}", &HeaderMap::new())
//!     .await;
//! assert_eq!(outcome, DeliveryOutcome::UnknownIntegration);
//! # }
//! ```

mod config;
mod error;
mod pipeline;
mod sync;

pub use crate::config::{PipelineConfig, WebhookSecrets};
pub use crate::error::PipelineError;
pub use crate::pipeline::{DeliveryOutcome, WebhookPipeline, UNKNOWN_TOPIC};
pub use crate::sync::{EmptySource, HistoricalSource, SyncHandle, SyncSupervisor};

pub use analytics::{
    AnalyticsError, aggregate, build_report, classify_trend, compare, generate_report, insights,
    organization_summary, percent_change, present, recommend, score,
};
pub use ingest::{IngestConfig, OrderRecognition, SignatureError};
pub use model::{
    AggregatedMetric, DataPoint, DataState, Integration, IntegrationId, IntegrationStatus,
    MetricType, MetricsSummary, NewIntegration, Platform, Report, Trend, WebhookEvent,
    WebhookStatus, Window,
};
pub use ratelimit::{
    Clock, LimiterClass, ManualClock, RateLimitConfig, RateLimitSettings, RateLimiters,
    SystemClock,
};
pub use store::{MemoryStore, StoreError, Stores};

/// Stage crates, for callers that need more than the re-exports.
pub use analytics;
pub use ingest;
pub use model;
pub use ratelimit;
pub use store;

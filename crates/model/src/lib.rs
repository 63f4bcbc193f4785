//! Bizpulse data model.
//!
//! Every crate in the workspace speaks these types: the ingest layer turns
//! webhook payloads into [`DataPoint`]s, the store persists them alongside
//! [`WebhookEvent`] audit records and [`Integration`]s, and the analytics
//! layer folds them into [`MetricsSummary`] values and [`Report`]s.
//!
//! ```text
//! Integration ──┬── WebhookEvent (one per delivery attempt)
//!               └── DataPoint    (immutable business observation)
//!
//!         aggregate(Window, Window)
//!                 ↓
//! MetricsSummary { revenue, orders, ..., conversion_rate: AggregatedMetric }
//!                 ↓
//! Report { score, recommendations, insights }
//! ```
//!
//! The crate holds no behaviour beyond constructors and invariant checks.
#![forbid(unsafe_code)]

mod datapoint;
mod error;
mod integration;
mod platform;
mod report;
mod summary;
mod webhook;
mod window;

pub use crate::datapoint::{DataPoint, MetricType};
pub use crate::error::ModelError;
pub use crate::integration::{Integration, IntegrationStatus, NewIntegration};
pub use crate::platform::Platform;
pub use crate::report::{Insight, InsightKind, Priority, Recommendation, Report};
pub use crate::summary::{AggregatedMetric, DataState, MetricClass, MetricsSummary, Trend};
pub use crate::webhook::{DeliveryKey, WebhookEvent, WebhookStatus};
pub use crate::window::Window;

/// Identifier of an [`Integration`].
pub type IntegrationId = uuid::Uuid;

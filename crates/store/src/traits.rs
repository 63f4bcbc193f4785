use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use model::{
    DataPoint, DeliveryKey, Integration, IntegrationId, IntegrationStatus, MetricType,
    NewIntegration, Report, WebhookEvent, WebhookStatus, Window,
};
use uuid::Uuid;

use crate::error::StoreError;

/// Result of claiming a delivery for processing.
///
/// Claims are atomic per [`DeliveryKey`]: of any number of concurrent
/// claims for the same key, at most one sees `Fresh` or `Retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// First delivery of this key; a `received` record was created.
    Fresh(Uuid),
    /// The previous attempt failed, or its lease ran out without the
    /// delivery settling; the record is `received` again.
    Retry(Uuid),
    /// Already processed. Nothing must be re-applied.
    AlreadyProcessed(Uuid),
    /// Another attempt holds an unexpired claim.
    InFlight(Uuid),
}

impl Claim {
    pub fn event_id(self) -> Uuid {
        match self {
            Claim::Fresh(id)
            | Claim::Retry(id)
            | Claim::AlreadyProcessed(id)
            | Claim::InFlight(id) => id,
        }
    }

    /// Whether the caller now owns the delivery and should process it.
    pub fn is_owned(self) -> bool {
        matches!(self, Claim::Fresh(_) | Claim::Retry(_))
    }
}

/// Connected platform accounts.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// Creates the integration, or resets the existing one for the same
    /// (organization, platform) to `pending` with the new account details.
    async fn upsert_integration(
        &self,
        new: NewIntegration,
        now: DateTime<Utc>,
    ) -> Result<Integration, StoreError>;

    async fn integration(&self, id: IntegrationId) -> Result<Option<Integration>, StoreError>;

    async fn integrations_for_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Integration>, StoreError>;

    async fn update_integration_status(
        &self,
        id: IntegrationId,
        status: IntegrationStatus,
        last_error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Integration, StoreError>;

    /// Marks a successful sync: `active`, `last_synced_at = at`, error cleared.
    /// A disconnected integration stays disconnected.
    async fn record_sync(
        &self,
        id: IntegrationId,
        at: DateTime<Utc>,
    ) -> Result<Integration, StoreError>;

    /// Soft-disconnect. The record is kept and its credentials dropped.
    async fn disconnect_integration(
        &self,
        id: IntegrationId,
        now: DateTime<Utc>,
    ) -> Result<Integration, StoreError>;
}

/// Append-only time series of observations.
#[async_trait]
pub trait DataPointStore: Send + Sync {
    /// Appends every point or none. Returns how many were stored.
    async fn append_points(&self, points: Vec<DataPoint>) -> Result<usize, StoreError>;

    /// Sum of `metric` values for `integration_ids` in `[start, end)`.
    async fn sum(
        &self,
        integration_ids: &[IntegrationId],
        metric: MetricType,
        window: Window,
    ) -> Result<f64, StoreError>;

    /// Points in `[start, end)`, oldest first. `None` matches every metric.
    async fn query_points(
        &self,
        integration_ids: &[IntegrationId],
        metric: Option<MetricType>,
        window: Window,
    ) -> Result<Vec<DataPoint>, StoreError>;
}

/// Audit log and idempotency ledger for webhook deliveries.
#[async_trait]
pub trait WebhookEventStore: Send + Sync {
    /// Atomically claims `key` for processing. Keys without an external
    /// event id cannot be deduplicated and always yield `Fresh`.
    ///
    /// A `received` record older than `lease` is taken over as `Retry`, so an
    /// attempt that died before settling does not block redeliveries forever.
    async fn claim_delivery(
        &self,
        key: &DeliveryKey,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Claim, StoreError>;

    /// Records a delivery rejected before it could be claimed.
    async fn record_rejection(
        &self,
        key: &DeliveryKey,
        status: WebhookStatus,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, StoreError>;

    async fn mark_processed(
        &self,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, StoreError>;

    async fn mark_failed(
        &self,
        event_id: Uuid,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, StoreError>;

    /// Claimed record for `key`, if any.
    async fn find_delivery(&self, key: &DeliveryKey) -> Result<Option<WebhookEvent>, StoreError>;

    /// Every record for an integration, oldest first.
    async fn events_for_integration(
        &self,
        integration_id: IntegrationId,
    ) -> Result<Vec<WebhookEvent>, StoreError>;
}

/// Generated reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert_report(&self, report: Report) -> Result<Report, StoreError>;

    async fn report(&self, id: Uuid) -> Result<Option<Report>, StoreError>;

    /// Newest first.
    async fn reports_for_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Report>, StoreError>;

    async fn set_report_read(&self, id: Uuid, read: bool) -> Result<Report, StoreError>;

    async fn delete_report(&self, id: Uuid) -> Result<(), StoreError>;
}

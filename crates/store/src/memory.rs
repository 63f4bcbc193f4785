//! In-memory backend.
//!
//! Every table sits behind its own `RwLock`. The webhook table keeps its
//! records and its key index under one lock so a claim is a single critical
//! section, which is what makes concurrent duplicate deliveries safe.
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use model::{
    DataPoint, DeliveryKey, Integration, IntegrationId, IntegrationStatus, MetricType,
    NewIntegration, Report, WebhookEvent, WebhookStatus, Window,
};
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::traits::{Claim, DataPointStore, IntegrationStore, ReportStore, WebhookEventStore};

#[derive(Debug, Default)]
struct WebhookTable {
    events: HashMap<Uuid, WebhookEvent>,
    /// Deduplicable keys only.
    by_key: HashMap<DeliveryKey, Uuid>,
    /// Insertion order for audit listings.
    order: Vec<Uuid>,
}

impl WebhookTable {
    fn insert(&mut self, event: WebhookEvent) -> Uuid {
        let id = event.id;
        self.order.push(id);
        self.events.insert(id, event);
        id
    }
}

/// Store backed by process memory. Data does not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    integrations: RwLock<HashMap<IntegrationId, Integration>>,
    points: RwLock<Vec<DataPoint>>,
    webhooks: RwLock<WebhookTable>,
    reports: RwLock<HashMap<Uuid, Report>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read().map_err(|_| StoreError::unavailable("poisoned lock"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write().map_err(|_| StoreError::unavailable("poisoned lock"))
}

fn matches(point: &DataPoint, ids: &[IntegrationId], window: &Window) -> bool {
    ids.contains(&point.integration_id) && window.contains(point.occurred_at)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored data points.
    pub fn point_count(&self) -> Result<usize, StoreError> {
        Ok(read(&self.points)?.len())
    }

    fn update_integration<F>(
        &self,
        id: IntegrationId,
        now: DateTime<Utc>,
        apply: F,
    ) -> Result<Integration, StoreError>
    where
        F: FnOnce(&mut Integration),
    {
        let mut guard = write(&self.integrations)?;
        let integration = guard
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("integration", id))?;
        apply(integration);
        integration.updated_at = now;
        Ok(integration.clone())
    }

    fn update_event<F>(&self, id: Uuid, apply: F) -> Result<WebhookEvent, StoreError>
    where
        F: FnOnce(&mut WebhookEvent),
    {
        let mut guard = write(&self.webhooks)?;
        let event = guard
            .events
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("webhook_event", id))?;
        apply(event);
        Ok(event.clone())
    }
}

#[async_trait]
impl IntegrationStore for MemoryStore {
    async fn upsert_integration(
        &self,
        new: NewIntegration,
        now: DateTime<Utc>,
    ) -> Result<Integration, StoreError> {
        let mut guard = write(&self.integrations)?;

        if let Some(existing) = guard
            .values_mut()
            .find(|i| i.organization_id == new.organization_id && i.platform == new.platform)
        {
            existing.external_account_id = new.external_account_id;
            if new.credentials.is_some() {
                existing.credentials = new.credentials;
            }
            existing.status = IntegrationStatus::Pending;
            existing.last_error = None;
            existing.updated_at = now;
            debug!(
                integration_id = %existing.id,
                platform = %existing.platform,
                "integration_reconnected"
            );
            return Ok(existing.clone());
        }

        let integration = Integration {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            platform: new.platform,
            external_account_id: new.external_account_id,
            credentials: new.credentials,
            status: IntegrationStatus::Pending,
            last_synced_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        guard.insert(integration.id, integration.clone());
        Ok(integration)
    }

    async fn integration(&self, id: IntegrationId) -> Result<Option<Integration>, StoreError> {
        Ok(read(&self.integrations)?.get(&id).cloned())
    }

    async fn integrations_for_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Integration>, StoreError> {
        let guard = read(&self.integrations)?;
        let mut found: Vec<Integration> = guard
            .values()
            .filter(|i| i.organization_id == organization_id)
            .cloned()
            .collect();
        found.sort_by_key(|i| (i.created_at, i.platform));
        Ok(found)
    }

    async fn update_integration_status(
        &self,
        id: IntegrationId,
        status: IntegrationStatus,
        last_error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Integration, StoreError> {
        self.update_integration(id, now, |i| {
            i.status = status;
            i.last_error = last_error;
        })
    }

    async fn record_sync(
        &self,
        id: IntegrationId,
        at: DateTime<Utc>,
    ) -> Result<Integration, StoreError> {
        self.update_integration(id, at, |i| {
            // A disconnect that lands mid-sync stays in force.
            if i.status != IntegrationStatus::Disconnected {
                i.status = IntegrationStatus::Active;
            }
            i.last_synced_at = Some(at);
            i.last_error = None;
        })
    }

    async fn disconnect_integration(
        &self,
        id: IntegrationId,
        now: DateTime<Utc>,
    ) -> Result<Integration, StoreError> {
        self.update_integration(id, now, |i| {
            i.status = IntegrationStatus::Disconnected;
            i.credentials = None;
        })
    }
}

#[async_trait]
impl DataPointStore for MemoryStore {
    async fn append_points(&self, points: Vec<DataPoint>) -> Result<usize, StoreError> {
        let count = points.len();
        write(&self.points)?.extend(points);
        Ok(count)
    }

    async fn sum(
        &self,
        integration_ids: &[IntegrationId],
        metric: MetricType,
        window: Window,
    ) -> Result<f64, StoreError> {
        let guard = read(&self.points)?;
        Ok(guard
            .iter()
            .filter(|p| p.metric == metric && matches(p, integration_ids, &window))
            .map(|p| p.value)
            .sum())
    }

    async fn query_points(
        &self,
        integration_ids: &[IntegrationId],
        metric: Option<MetricType>,
        window: Window,
    ) -> Result<Vec<DataPoint>, StoreError> {
        let guard = read(&self.points)?;
        let mut found: Vec<DataPoint> = guard
            .iter()
            .filter(|p| metric.is_none_or(|m| p.metric == m))
            .filter(|p| matches(p, integration_ids, &window))
            .cloned()
            .collect();
        found.sort_by_key(|p| p.occurred_at);
        Ok(found)
    }
}

#[async_trait]
impl WebhookEventStore for MemoryStore {
    async fn claim_delivery(
        &self,
        key: &DeliveryKey,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Claim, StoreError> {
        let mut table = write(&self.webhooks)?;

        if !key.is_deduplicable() {
            let id = table.insert(WebhookEvent::received(key, now));
            return Ok(Claim::Fresh(id));
        }

        if let Some(id) = table.by_key.get(key).copied() {
            let event = table
                .events
                .get_mut(&id)
                .ok_or_else(|| StoreError::not_found("webhook_event", id))?;
            event.attempts = event.attempts.saturating_add(1);
            return Ok(match event.status {
                WebhookStatus::Processed => Claim::AlreadyProcessed(id),
                WebhookStatus::Failed => {
                    event.status = WebhookStatus::Received;
                    event.error = None;
                    event.received_at = now;
                    Claim::Retry(id)
                }
                WebhookStatus::Received if now - event.received_at >= lease => {
                    debug!(
                        event_id = %id,
                        claimed_at = %event.received_at,
                        "webhook_claim_lease_expired"
                    );
                    event.received_at = now;
                    Claim::Retry(id)
                }
                _ => Claim::InFlight(id),
            });
        }

        let id = table.insert(WebhookEvent::received(key, now));
        table.by_key.insert(key.clone(), id);
        Ok(Claim::Fresh(id))
    }

    async fn record_rejection(
        &self,
        key: &DeliveryKey,
        status: WebhookStatus,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, StoreError> {
        if !status.is_rejection() {
            return Err(StoreError::Conflict(format!(
                "`{status}` is not a rejection status"
            )));
        }
        let mut event = WebhookEvent::received(key, now);
        event.status = status;
        event.error = Some(error);
        let mut table = write(&self.webhooks)?;
        table.insert(event.clone());
        Ok(event)
    }

    async fn mark_processed(
        &self,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, StoreError> {
        self.update_event(event_id, |e| {
            e.status = WebhookStatus::Processed;
            e.processed_at = Some(now);
            e.error = None;
        })
    }

    async fn mark_failed(
        &self,
        event_id: Uuid,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, StoreError> {
        self.update_event(event_id, |e| {
            e.status = WebhookStatus::Failed;
            e.processed_at = Some(now);
            e.error = Some(error);
        })
    }

    async fn find_delivery(&self, key: &DeliveryKey) -> Result<Option<WebhookEvent>, StoreError> {
        let table = read(&self.webhooks)?;
        Ok(table
            .by_key
            .get(key)
            .and_then(|id| table.events.get(id))
            .cloned())
    }

    async fn events_for_integration(
        &self,
        integration_id: IntegrationId,
    ) -> Result<Vec<WebhookEvent>, StoreError> {
        let table = read(&self.webhooks)?;
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.events.get(id))
            .filter(|e| e.integration_id == integration_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn insert_report(&self, report: Report) -> Result<Report, StoreError> {
        let mut guard = write(&self.reports)?;
        if guard.contains_key(&report.id) {
            return Err(StoreError::Conflict(format!("report `{}` exists", report.id)));
        }
        guard.insert(report.id, report.clone());
        Ok(report)
    }

    async fn report(&self, id: Uuid) -> Result<Option<Report>, StoreError> {
        Ok(read(&self.reports)?.get(&id).cloned())
    }

    async fn reports_for_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Report>, StoreError> {
        let guard = read(&self.reports)?;
        let mut found: Vec<Report> = guard
            .values()
            .filter(|r| r.organization_id == organization_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn set_report_read(&self, id: Uuid, read_flag: bool) -> Result<Report, StoreError> {
        let mut guard = write(&self.reports)?;
        let report = guard
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("report", id))?;
        report.read = read_flag;
        Ok(report.clone())
    }

    async fn delete_report(&self, id: Uuid) -> Result<(), StoreError> {
        write(&self.reports)?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("report", id))
    }
}

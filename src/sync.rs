//! Supervised historical sync for newly connected integrations.
//!
//! A connection handshake must return immediately, so the initial backfill
//! runs on its own tokio task. Nobody awaits it in production; failures are
//! logged and written to the integration as `error` + `last_error`.
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use model::{DataPoint, Integration, IntegrationId, IntegrationStatus, NewIntegration};
use ratelimit::Clock;
use store::Stores;
use tokio::task::JoinHandle;
use tracing::{Instrument, Level, error, info, warn};

use crate::error::PipelineError;

/// Reads observations that predate the connection.
#[async_trait]
pub trait HistoricalSource: Send + Sync {
    async fn fetch_history(&self, integration: &Integration)
        -> Result<Vec<DataPoint>, PipelineError>;
}

/// A source with no history. Syncs against it only activate the integration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

#[async_trait]
impl HistoricalSource for EmptySource {
    async fn fetch_history(
        &self,
        _integration: &Integration,
    ) -> Result<Vec<DataPoint>, PipelineError> {
        Ok(Vec::new())
    }
}

/// Handle to a running sync. Dropping it detaches the task.
#[derive(Debug)]
pub struct SyncHandle {
    integration_id: IntegrationId,
    task: JoinHandle<Result<usize, PipelineError>>,
}

impl SyncHandle {
    pub fn integration_id(&self) -> IntegrationId {
        self.integration_id
    }

    /// Waits for the sync; returns how many points it appended.
    pub async fn join(self) -> Result<usize, PipelineError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(PipelineError::SyncAborted(err.to_string())),
        }
    }
}

/// Spawns historical syncs and owns their error path.
#[derive(Clone)]
pub struct SyncSupervisor {
    stores: Stores,
    source: Arc<dyn HistoricalSource>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SyncSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSupervisor").finish_non_exhaustive()
    }
}

impl SyncSupervisor {
    pub fn new(stores: Stores, source: Arc<dyn HistoricalSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            stores,
            source,
            clock,
        }
    }

    /// Upserts the integration as `pending` and starts its sync.
    ///
    /// Returns as soon as the record is stored; the sync continues on its
    /// own task.
    pub async fn connect_integration(
        &self,
        new: NewIntegration,
    ) -> Result<(Integration, SyncHandle), PipelineError> {
        let integration = self
            .stores
            .integrations
            .upsert_integration(new, self.clock.now())
            .await?;
        info!(
            integration_id = %integration.id,
            organization_id = %integration.organization_id,
            platform = %integration.platform,
            "integration_connected"
        );
        let handle = self.spawn(integration.clone());
        Ok((integration, handle))
    }

    /// Runs the sync for `integration` on a new task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, integration: Integration) -> SyncHandle {
        let integration_id = integration.id;
        let span = tracing::span!(
            Level::INFO,
            "sync.run",
            integration_id = %integration_id,
            platform = %integration.platform
        );
        let this = self.clone();
        let task = tokio::spawn(async move { this.supervise(integration).await }.instrument(span));
        SyncHandle {
            integration_id,
            task,
        }
    }

    async fn supervise(&self, integration: Integration) -> Result<usize, PipelineError> {
        let start = Instant::now();
        let id = integration.id;
        match self.run(&integration).await {
            Ok(appended) => {
                metrics::counter!("sync_runs_total", "outcome" => "succeeded").increment(1);
                info!(
                    integration_id = %id,
                    appended,
                    elapsed_micros = start.elapsed().as_micros() as u64,
                    "sync_complete"
                );
                Ok(appended)
            }
            Err(err) => {
                metrics::counter!("sync_runs_total", "outcome" => "failed").increment(1);
                error!(integration_id = %id, error = %err, "sync_failed");
                // A disconnect during the sync wins over the failure.
                if !matches!(err, PipelineError::Disconnected(_)) {
                    let marked = self
                        .stores
                        .integrations
                        .update_integration_status(
                            id,
                            IntegrationStatus::Error,
                            Some(err.to_string()),
                            self.clock.now(),
                        )
                        .await;
                    if let Err(store_err) = marked {
                        warn!(integration_id = %id, error = %store_err, "sync_status_not_recorded");
                    }
                }
                Err(err)
            }
        }
    }

    async fn run(&self, integration: &Integration) -> Result<usize, PipelineError> {
        if !integration.is_connected() {
            return Err(PipelineError::Disconnected(integration.id));
        }

        let mut points = self.source.fetch_history(integration).await?;
        let fetched = points.len();
        points.retain(|p| p.integration_id == integration.id);
        if points.len() != fetched {
            warn!(
                integration_id = %integration.id,
                dropped = fetched - points.len(),
                "sync_foreign_points_dropped"
            );
        }

        // The integration may have been disconnected while we were fetching.
        let current = self.stores.integrations.integration(integration.id).await?;
        if !current.is_some_and(|i| i.is_connected()) {
            return Err(PipelineError::Disconnected(integration.id));
        }

        let appended = if points.is_empty() {
            0
        } else {
            self.stores.points.append_points(points).await?
        };
        metrics::counter!("data_points_appended_total").increment(appended as u64);
        self.stores
            .integrations
            .record_sync(integration.id, self.clock.now())
            .await?;
        Ok(appended)
    }
}

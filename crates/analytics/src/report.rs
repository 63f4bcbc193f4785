//! Report assembly and organization-level entry points.
use chrono::{DateTime, Utc};
use model::{IntegrationId, MetricsSummary, Report, Window};
use store::{IntegrationStore, StoreError, Stores};
use tracing::info;
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::error::AnalyticsError;
use crate::insight::insights;
use crate::metric::present;
use crate::recommend::recommend;
use crate::score::score;

/// Bundles score, presented metrics, recommendations, and insights.
///
/// Scoring and rules read the full-precision summary; only the stored
/// metrics are rounded.
pub fn build_report(
    organization_id: &str,
    summary: &MetricsSummary,
    created_at: DateTime<Utc>,
) -> Report {
    Report {
        id: Uuid::new_v4(),
        organization_id: organization_id.to_string(),
        period: summary.current_window,
        score: score(summary),
        metrics: present(summary),
        recommendations: recommend(summary),
        insights: insights(summary),
        created_at,
        read: false,
    }
}

/// Ids of the organization's integrations that are not disconnected.
pub async fn connected_integration_ids(
    integrations: &dyn IntegrationStore,
    organization_id: &str,
) -> Result<Vec<IntegrationId>, StoreError> {
    Ok(integrations
        .integrations_for_organization(organization_id)
        .await?
        .into_iter()
        .filter(|i| i.is_connected())
        .map(|i| i.id)
        .collect())
}

/// Aggregates everything an organization has connected.
pub async fn organization_summary(
    stores: &Stores,
    organization_id: &str,
    current: Window,
    previous: Option<Window>,
) -> Result<MetricsSummary, AnalyticsError> {
    let ids = connected_integration_ids(stores.integrations.as_ref(), organization_id).await?;
    Ok(aggregate(stores.points.as_ref(), &ids, current, previous).await?)
}

/// Generates and stores a report for `period`.
pub async fn generate_report(
    stores: &Stores,
    organization_id: &str,
    period: Window,
    now: DateTime<Utc>,
) -> Result<Report, AnalyticsError> {
    let summary = organization_summary(stores, organization_id, period, None).await?;
    let report = stores
        .reports
        .insert_report(build_report(organization_id, &summary, now))
        .await?;
    info!(
        organization_id,
        report_id = %report.id,
        score = report.score,
        recommendations = report.recommendations.len(),
        "report_generated"
    );
    Ok(report)
}

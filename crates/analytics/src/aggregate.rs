//! Period-over-period aggregation.
use std::time::Instant;

use model::{DataPoint, DataState, IntegrationId, MetricType, MetricsSummary, Window};
use store::{DataPointStore, StoreError};
use tracing::debug;

use crate::metric::{compare, ratio};

/// Base sums for one window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub revenue: f64,
    pub orders: f64,
    pub sessions: f64,
    pub customers: f64,
    pub refunds: f64,
}

impl Totals {
    fn set(&mut self, metric: MetricType, value: f64) {
        match metric {
            MetricType::Revenue => self.revenue = value,
            MetricType::Orders => self.orders = value,
            MetricType::Sessions => self.sessions = value,
            MetricType::Customers => self.customers = value,
            MetricType::Refunds => self.refunds = value,
        }
    }

    fn is_empty(&self) -> bool {
        *self == Totals::default()
    }

    /// Revenue per order; `0` without orders.
    pub fn average_order_value(&self) -> f64 {
        ratio(self.revenue, self.orders)
    }

    /// Orders per session as a percentage; `0` without sessions.
    pub fn conversion_rate(&self) -> f64 {
        ratio(self.orders * 100.0, self.sessions)
    }

    /// Sums every tracked metric from the store.
    pub async fn from_store(
        store: &dyn DataPointStore,
        integration_ids: &[IntegrationId],
        window: Window,
    ) -> Result<Self, StoreError> {
        let mut totals = Totals::default();
        for metric in MetricType::TRACKED {
            totals.set(metric, store.sum(integration_ids, metric, window).await?);
        }
        Ok(totals)
    }

    /// Sums every tracked metric from points already in memory.
    pub fn from_points(
        points: &[DataPoint],
        integration_ids: &[IntegrationId],
        window: Window,
    ) -> Self {
        let mut totals = Totals::default();
        for metric in MetricType::TRACKED {
            totals.set(metric, sum_points(points, integration_ids, metric, window));
        }
        totals
    }
}

/// Reference sum: every `metric` value for `integration_ids` in `[start, end)`.
///
/// A store's `sum` must agree with this over the same points.
pub fn sum_points(
    points: &[DataPoint],
    integration_ids: &[IntegrationId],
    metric: MetricType,
    window: Window,
) -> f64 {
    points
        .iter()
        .filter(|p| {
            p.metric == metric
                && integration_ids.contains(&p.integration_id)
                && window.contains(p.occurred_at)
        })
        .map(|p| p.value)
        .sum()
}

/// Builds a summary from the base sums of two windows.
pub fn summarize(
    current_window: Window,
    previous_window: Window,
    has_integrations: bool,
    current: Totals,
    previous: Totals,
) -> MetricsSummary {
    let data_state = if !has_integrations {
        DataState::NoIntegrations
    } else if current.is_empty() && previous.is_empty() {
        DataState::NoData
    } else {
        DataState::Ready
    };

    let mut summary = MetricsSummary::empty(current_window, previous_window, data_state);
    summary.revenue = compare(current.revenue, previous.revenue);
    summary.orders = compare(current.orders, previous.orders);
    summary.sessions = compare(current.sessions, previous.sessions);
    summary.customers = compare(current.customers, previous.customers);
    summary.refunds = compare(current.refunds, previous.refunds);
    summary.average_order_value =
        compare(current.average_order_value(), previous.average_order_value());
    summary.conversion_rate = compare(current.conversion_rate(), previous.conversion_rate());
    summary
}

/// Aggregates `integration_ids` over `current` and the comparison window
/// (`current.preceding()` unless given).
///
/// With no integrations the store is not consulted and the summary is all
/// zero and neutral.
pub async fn aggregate(
    store: &dyn DataPointStore,
    integration_ids: &[IntegrationId],
    current: Window,
    previous: Option<Window>,
) -> Result<MetricsSummary, StoreError> {
    let start = Instant::now();
    let previous = previous.unwrap_or_else(|| current.preceding());

    if integration_ids.is_empty() {
        return Ok(MetricsSummary::empty(current, previous, DataState::NoIntegrations));
    }

    let current_totals = Totals::from_store(store, integration_ids, current).await?;
    let previous_totals = Totals::from_store(store, integration_ids, previous).await?;
    let summary = summarize(current, previous, true, current_totals, previous_totals);

    debug!(
        integrations = integration_ids.len(),
        data_state = ?summary.data_state,
        elapsed_micros = start.elapsed().as_micros() as u64,
        "aggregate_complete"
    );
    Ok(summary)
}

/// In-memory counterpart of [`aggregate`].
pub fn aggregate_points(
    points: &[DataPoint],
    integration_ids: &[IntegrationId],
    current: Window,
    previous: Option<Window>,
) -> MetricsSummary {
    let previous = previous.unwrap_or_else(|| current.preceding());
    if integration_ids.is_empty() {
        return MetricsSummary::empty(current, previous, DataState::NoIntegrations);
    }
    summarize(
        current,
        previous,
        true,
        Totals::from_points(points, integration_ids, current),
        Totals::from_points(points, integration_ids, previous),
    )
}

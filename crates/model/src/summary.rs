use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Window;

/// Three-valued classification of a percentage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Neutral => "neutral",
        })
    }
}

/// Presentation class of a metric; decides display precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricClass {
    Currency,
    Count,
    Percentage,
}

/// One metric compared across two adjacent windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregatedMetric {
    pub current: f64,
    pub previous: f64,
    /// `current - previous`.
    pub change: f64,
    pub change_percent: f64,
    pub trend: Trend,
}

/// Whether a summary is backed by anything.
///
/// Lets the dashboard render "no data yet" rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataState {
    NoIntegrations,
    NoData,
    Ready,
}

/// Output of the aggregation engine for one pair of windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub current_window: Window,
    pub previous_window: Window,
    pub data_state: DataState,
    pub revenue: AggregatedMetric,
    pub orders: AggregatedMetric,
    pub sessions: AggregatedMetric,
    pub customers: AggregatedMetric,
    pub refunds: AggregatedMetric,
    pub average_order_value: AggregatedMetric,
    pub conversion_rate: AggregatedMetric,
}

impl MetricsSummary {
    /// All-zero, all-neutral baseline.
    pub fn empty(current_window: Window, previous_window: Window, data_state: DataState) -> Self {
        Self {
            current_window,
            previous_window,
            data_state,
            revenue: AggregatedMetric::default(),
            orders: AggregatedMetric::default(),
            sessions: AggregatedMetric::default(),
            customers: AggregatedMetric::default(),
            refunds: AggregatedMetric::default(),
            average_order_value: AggregatedMetric::default(),
            conversion_rate: AggregatedMetric::default(),
        }
    }

    /// Named view over every metric with its presentation class.
    pub fn entries(&self) -> [(&'static str, MetricClass, &AggregatedMetric); 7] {
        [
            ("revenue", MetricClass::Currency, &self.revenue),
            ("orders", MetricClass::Count, &self.orders),
            ("sessions", MetricClass::Count, &self.sessions),
            ("customers", MetricClass::Count, &self.customers),
            ("refunds", MetricClass::Currency, &self.refunds),
            ("average_order_value", MetricClass::Currency, &self.average_order_value),
            ("conversion_rate", MetricClass::Percentage, &self.conversion_rate),
        ]
    }

    pub fn entries_mut(&mut self) -> [(MetricClass, &mut AggregatedMetric); 7] {
        [
            (MetricClass::Currency, &mut self.revenue),
            (MetricClass::Count, &mut self.orders),
            (MetricClass::Count, &mut self.sessions),
            (MetricClass::Count, &mut self.customers),
            (MetricClass::Currency, &mut self.refunds),
            (MetricClass::Currency, &mut self.average_order_value),
            (MetricClass::Percentage, &mut self.conversion_rate),
        ]
    }
}

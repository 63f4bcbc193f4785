//! Per-metric arithmetic: change, trend, and display rounding.
use model::{AggregatedMetric, MetricClass, MetricsSummary, Trend};

/// Changes within this many percent either way are `neutral`.
pub const TREND_THRESHOLD_PERCENT: f64 = 1.0;

/// Percentage change from `previous` to `current`.
///
/// A zero baseline yields `100` when anything appeared and `0` otherwise,
/// so new activity never divides by zero.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Classifies a full-precision percentage change.
pub fn classify_trend(change_percent: f64) -> Trend {
    if change_percent > TREND_THRESHOLD_PERCENT {
        Trend::Up
    } else if change_percent < -TREND_THRESHOLD_PERCENT {
        Trend::Down
    } else {
        Trend::Neutral
    }
}

/// Compares one metric across two windows.
pub fn compare(current: f64, previous: f64) -> AggregatedMetric {
    let change_percent = percent_change(current, previous);
    AggregatedMetric {
        current,
        previous,
        change: current - previous,
        change_percent,
        trend: classify_trend(change_percent),
    }
}

/// `numerator / denominator`, or `0` when the denominator is zero.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // Avoid rendering "-0".
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn decimals(class: MetricClass) -> i32 {
    match class {
        MetricClass::Currency => 2,
        MetricClass::Percentage => 1,
        MetricClass::Count => 0,
    }
}

/// Rounds one metric for display. The trend is carried over untouched.
pub fn present_metric(metric: &AggregatedMetric, class: MetricClass) -> AggregatedMetric {
    let places = decimals(class);
    AggregatedMetric {
        current: round_to(metric.current, places),
        previous: round_to(metric.previous, places),
        change: round_to(metric.change, places),
        change_percent: round_to(metric.change_percent, 1),
        trend: metric.trend,
    }
}

/// Display copy of a summary: currency 2 dp, percentages 1 dp, counts 0 dp.
pub fn present(summary: &MetricsSummary) -> MetricsSummary {
    let mut out = summary.clone();
    for (class, metric) in out.entries_mut() {
        *metric = present_metric(metric, class);
    }
    out
}

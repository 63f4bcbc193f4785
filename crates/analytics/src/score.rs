//! Bounded 0-100 performance score.
use model::MetricsSummary;

/// Score with no movement in any direction.
pub const BASE_SCORE: i32 = 50;

/// `(threshold, points)` bands, checked in order; the first strict match wins.
const REVENUE_GROWTH: [(f64, i32); 3] = [(20.0, 25), (10.0, 15), (0.0, 10)];
const ORDER_GROWTH: [(f64, i32); 3] = [(15.0, 15), (5.0, 10), (0.0, 5)];

fn growth_points(change_percent: f64, bands: &[(f64, i32)]) -> i32 {
    if change_percent > 0.0 {
        bands
            .iter()
            .find(|(threshold, _)| change_percent > *threshold)
            .map_or(0, |(_, points)| *points)
    } else if change_percent < 0.0 {
        -bands
            .iter()
            .find(|(threshold, _)| change_percent < -*threshold)
            .map_or(0, |(_, points)| *points)
    } else {
        0
    }
}

fn conversion_points(rate: f64) -> i32 {
    if rate > 5.0 {
        10
    } else if rate > 3.0 {
        5
    } else if rate < 1.0 {
        -10
    } else {
        0
    }
}

/// Scores a summary: base 50, adjusted by revenue growth, order growth, and
/// the current conversion rate, clamped to `[0, 100]`.
pub fn score(summary: &MetricsSummary) -> u8 {
    let raw = BASE_SCORE
        + growth_points(summary.revenue.change_percent, &REVENUE_GROWTH)
        + growth_points(summary.orders.change_percent, &ORDER_GROWTH)
        + conversion_points(summary.conversion_rate.current);
    // Clamped into u8 range above.
    raw.clamp(0, 100) as u8
}

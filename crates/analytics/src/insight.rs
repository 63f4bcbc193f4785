//! Deterministic narrative statements about metric movement.
use model::{AggregatedMetric, Insight, InsightKind, MetricClass, MetricsSummary, Trend};

use crate::metric::present_metric;

fn label(metric: &str) -> &str {
    match metric {
        "revenue" => "Revenue",
        "orders" => "Orders",
        "sessions" => "Sessions",
        "customers" => "Customers",
        "refunds" => "Refunds",
        "average_order_value" => "Average order value",
        "conversion_rate" => "Conversion rate",
        other => other,
    }
}

fn format_value(value: f64, class: MetricClass) -> String {
    match class {
        MetricClass::Currency => format!("{value:.2}"),
        MetricClass::Percentage => format!("{value:.1}%"),
        MetricClass::Count => format!("{value:.0}"),
    }
}

fn insight(name: &str, class: MetricClass, metric: &AggregatedMetric) -> Option<Insight> {
    let (verb, direction) = match metric.trend {
        Trend::Up => ("rose", "up"),
        Trend::Down => ("fell", "down"),
        Trend::Neutral => return None,
    };
    // More refunds is bad news.
    let good = (metric.trend == Trend::Up) != (name == "refunds");
    let kind = if good {
        InsightKind::Positive
    } else {
        InsightKind::Negative
    };

    let shown = present_metric(metric, class);
    let label = label(name);
    Some(Insight {
        kind,
        metric: name.to_string(),
        title: format!("{label} {direction} {:.1}%", shown.change_percent.abs()),
        description: format!(
            "{label} {verb} from {} to {} compared with the previous period.",
            format_value(shown.previous, class),
            format_value(shown.current, class),
        ),
    })
}

/// One insight per metric whose trend is not neutral, in summary order.
pub fn insights(summary: &MetricsSummary) -> Vec<Insight> {
    summary
        .entries()
        .into_iter()
        .filter_map(|(name, class, metric)| insight(name, class, metric))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::compare;
    use chrono::{TimeZone, Utc};
    use model::{DataState, Window};

    fn base() -> MetricsSummary {
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let w = Window::trailing_days(end, 7).unwrap();
        MetricsSummary::empty(w, w.preceding(), DataState::Ready)
    }

    #[test]
    fn describes_movement_with_display_precision() {
        let mut s = base();
        s.revenue = compare(125.0, 100.0);
        s.orders = compare(9.0, 10.0);
        s.sessions = compare(1000.0, 1005.0);

        let out = insights(&s);
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].kind, InsightKind::Positive);
        assert_eq!(out[0].metric, "revenue");
        assert_eq!(out[0].title, "Revenue up 25.0%");
        assert_eq!(
            out[0].description,
            "Revenue rose from 100.00 to 125.00 compared with the previous period."
        );

        assert_eq!(out[1].kind, InsightKind::Negative);
        assert_eq!(out[1].title, "Orders down 10.0%");
    }

    #[test]
    fn rising_refunds_are_negative() {
        let mut s = base();
        s.refunds = compare(30.0, 10.0);
        let out = insights(&s);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, InsightKind::Negative);

        s.refunds = compare(5.0, 10.0);
        assert_eq!(insights(&s)[0].kind, InsightKind::Positive);
    }

    #[test]
    fn flat_summary_has_no_insights() {
        assert!(insights(&base()).is_empty());
    }
}

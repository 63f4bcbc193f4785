//! Threshold rules that turn a summary into recommendations.
use model::{DataState, MetricsSummary, Priority, Recommendation};

/// Conversion rate (percent) below which checkout needs attention.
pub const LOW_CONVERSION_PERCENT: f64 = 2.0;
/// Average order value below which upsells are suggested.
pub const LOW_AVERAGE_ORDER_VALUE: f64 = 50.0;
/// Sessions per window below which traffic acquisition is suggested.
pub const LOW_SESSIONS: f64 = 1000.0;

fn recommendation(
    category: &str,
    title: &str,
    description: &str,
    priority: Priority,
) -> Recommendation {
    Recommendation {
        category: category.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        priority,
    }
}

fn connect_first_integration() -> Recommendation {
    recommendation(
        "setup",
        "Connect your first integration",
        "Link your store or payment processor so sales start flowing into your dashboard.",
        Priority::High,
    )
}

fn keep_monitoring() -> Recommendation {
    recommendation(
        "general",
        "Keep monitoring your metrics",
        "Nothing needs urgent attention. Check back as new data arrives.",
        Priority::Low,
    )
}

/// Evaluates every rule independently against the current window.
///
/// Without connected integrations the answer is always "connect your first
/// integration" followed by "keep monitoring". When no rule fires, the
/// single "keep monitoring" entry is returned. Output is ordered by
/// priority, rule order breaking ties.
pub fn recommend(summary: &MetricsSummary) -> Vec<Recommendation> {
    if summary.data_state == DataState::NoIntegrations {
        return vec![connect_first_integration(), keep_monitoring()];
    }

    let mut out = Vec::new();

    if summary.conversion_rate.current < LOW_CONVERSION_PERCENT {
        out.push(recommendation(
            "conversion",
            "Optimize your checkout flow",
            "Fewer than 2% of sessions end in an order. Shorten checkout and add trust signals near the buy button.",
            Priority::High,
        ));
    }
    if summary.average_order_value.current < LOW_AVERAGE_ORDER_VALUE {
        out.push(recommendation(
            "revenue",
            "Raise your average order value",
            "Offer bundles or upsells at checkout to lift the value of each order.",
            Priority::Medium,
        ));
    }
    if summary.sessions.current < LOW_SESSIONS {
        out.push(recommendation(
            "traffic",
            "Grow your traffic",
            "Invest in search, social or email campaigns to bring more visitors to your store.",
            Priority::Medium,
        ));
    }

    if out.is_empty() {
        out.push(keep_monitoring());
    }
    out.sort_by_key(|r| r.priority);
    out
}

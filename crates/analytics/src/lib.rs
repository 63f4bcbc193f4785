//! Bizpulse analytics.
//!
//! Turns stored observations into something a business owner can act on:
//!
//! 1. [`aggregate`] sums each tracked metric over a window and its
//!    comparison window, derives average order value and conversion rate,
//!    and classifies each change as up, down, or neutral.
//! 2. [`score`] condenses the summary into a 0-100 performance score.
//! 3. [`recommend`] applies threshold rules; [`insights`] narrates movement.
//! 4. [`build_report`] bundles all of the above; [`present`] rounds for display.
//!
//! Everything except the store reads in [`aggregate`] is pure and
//! synchronous. Trends are classified on full precision; rounding happens
//! only in [`present`].
//!
//! ```
//! use analytics::{classify_trend, compare, percent_change};
//! use model::Trend;
//!
//! assert_eq!(percent_change(125.0, 100.0), 25.0);
//! assert_eq!(classify_trend(1.5), Trend::Up);
//! assert_eq!(classify_trend(-0.5), Trend::Neutral);
//! assert_eq!(compare(95.0, 100.0).trend, Trend::Down);
//! ```
#![forbid(unsafe_code)]

mod aggregate;
mod error;
mod insight;
mod metric;
mod recommend;
mod report;
mod score;

pub use crate::aggregate::{aggregate, aggregate_points, sum_points, summarize, Totals};
pub use crate::error::AnalyticsError;
pub use crate::insight::insights;
pub use crate::metric::{
    classify_trend, compare, percent_change, present, present_metric, TREND_THRESHOLD_PERCENT,
};
pub use crate::recommend::{
    recommend, LOW_AVERAGE_ORDER_VALUE, LOW_CONVERSION_PERCENT, LOW_SESSIONS,
};
pub use crate::report::{
    build_report, connected_integration_ids, generate_report, organization_summary,
};
pub use crate::score::{score, BASE_SCORE};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{IntegrationId, ModelError};

/// Kind of business observation carried by a [`DataPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Gross revenue in major currency units.
    Revenue,
    Orders,
    Sessions,
    Customers,
    /// Refunded amount in major currency units. Stored as a positive
    /// compensating observation, never as negative revenue.
    Refunds,
}

impl MetricType {
    /// Base metrics summed by the aggregation engine.
    pub const TRACKED: [MetricType; 5] = [
        MetricType::Revenue,
        MetricType::Orders,
        MetricType::Sessions,
        MetricType::Customers,
        MetricType::Refunds,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Revenue => "revenue",
            MetricType::Orders => "orders",
            MetricType::Sessions => "sessions",
            MetricType::Customers => "customers",
            MetricType::Refunds => "refunds",
        }
    }

    /// Monetary metrics must name their currency.
    pub fn is_monetary(self) -> bool {
        matches!(self, MetricType::Revenue | MetricType::Refunds)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, timestamped business observation.
///
/// `occurred_at` is business time (when the order was paid, the session
/// happened), not ingestion time. Corrections are recorded as new
/// compensating points; nothing edits a point in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub id: Uuid,
    pub integration_id: IntegrationId,
    pub metric: MetricType,
    pub value: f64,
    #[serde(default)]
    pub metadata: Value,
    pub occurred_at: DateTime<Utc>,
}

impl DataPoint {
    /// Builds a point, checking the value and metadata invariants.
    ///
    /// Every metric in [`MetricType`] is count- or amount-like, so all of them
    /// reject negative values.
    pub fn new(
        integration_id: IntegrationId,
        metric: MetricType,
        value: f64,
        metadata: Value,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        if !value.is_finite() {
            return Err(ModelError::NonFiniteValue {
                metric: metric.as_str(),
            });
        }
        if value < 0.0 {
            return Err(ModelError::NegativeValue {
                metric: metric.as_str(),
                value,
            });
        }
        if metric.is_monetary() && currency_of(&metadata).is_none() {
            return Err(ModelError::MissingCurrency {
                metric: metric.as_str(),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            integration_id,
            metric,
            value,
            metadata,
            occurred_at,
        })
    }

    /// Currency code recorded in metadata, if any.
    pub fn currency(&self) -> Option<&str> {
        currency_of(&self.metadata)
    }
}

fn currency_of(metadata: &Value) -> Option<&str> {
    metadata
        .get("currency")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MetricsSummary, Window};

/// Ordering key for recommendations; `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Positive,
    Negative,
    Neutral,
}

/// Narrative statement about one metric's movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub metric: String,
    pub title: String,
    pub description: String,
}

/// Stored periodic report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub organization_id: String,
    pub period: Window,
    /// Performance score in `[0, 100]`.
    pub score: u8,
    /// Rounded for display.
    pub metrics: MetricsSummary,
    pub recommendations: Vec<Recommendation>,
    pub insights: Vec<Insight>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

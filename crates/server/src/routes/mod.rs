//! API route handlers
//!
//! Routes are organized by functionality:
//!
//! - `health`: Health checks, readiness, and Prometheus metrics
//! - `webhooks`: Signed platform deliveries (no API key)
//! - `metrics`: Period-over-period aggregation queries
//! - `reports`: Report generation, listing, read state, recommendations
//! - `integrations`: Connecting and disconnecting platform accounts

pub mod health;
pub mod integrations;
pub mod metrics;
pub mod reports;
pub mod webhooks;

use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use model::{IntegrationId, Window};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// API version and base info
///
/// Returns server information including version and available endpoints.
/// This is the root endpoint (GET /) and requires no authentication.
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "Bizpulse Server",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1",
        "endpoints": [
            "/webhooks/{platform}/{integration_id}",
            "/api/v1/metrics",
            "/api/v1/recommendations",
            "/api/v1/reports",
            "/api/v1/integrations",
            "/health",
            "/ready",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound("route".to_string())
}

/// `?organization_id=` on list endpoints.
#[derive(Debug, Deserialize)]
pub struct OrganizationQuery {
    pub organization_id: String,
}

/// Selection and period shared by the metrics and recommendations queries.
///
/// Exactly one of `integration_ids` (comma separated) or `organization_id`
/// selects the integrations. Without `compare_start`/`compare_end` the
/// comparison window is the one immediately before `[start, end)`.
#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    #[serde(default)]
    pub integration_ids: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub compare_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub compare_end: Option<DateTime<Utc>>,
    /// Round values for display.
    #[serde(default)]
    pub presented: bool,
}

impl PeriodQuery {
    pub fn windows(&self) -> ServerResult<(Window, Option<Window>)> {
        let current = Window::new(self.start, self.end)?;
        let previous = match (self.compare_start, self.compare_end) {
            (Some(start), Some(end)) => Some(Window::new(start, end)?),
            (None, None) => None,
            _ => {
                return Err(ServerError::BadRequest(
                    "compare_start and compare_end must be given together".to_string(),
                ))
            }
        };
        Ok((current, previous))
    }

    /// Integrations the query covers. Organizations contribute only their
    /// connected integrations.
    pub async fn integration_ids(&self, state: &ServerState) -> ServerResult<Vec<IntegrationId>> {
        match (&self.integration_ids, &self.organization_id) {
            (Some(ids), None) => parse_ids(ids),
            (None, Some(org)) => Ok(analytics::connected_integration_ids(
                state.stores.integrations.as_ref(),
                org,
            )
            .await?),
            _ => Err(ServerError::BadRequest(
                "provide exactly one of integration_ids or organization_id".to_string(),
            )),
        }
    }
}

fn parse_ids(raw: &str) -> ServerResult<Vec<IntegrationId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Uuid>()
                .map_err(|_| ServerError::BadRequest(format!("invalid integration id `{s}`")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(compare: Option<(&str, &str)>) -> PeriodQuery {
        PeriodQuery {
            integration_ids: None,
            organization_id: Some("org".into()),
            start: "2026-02-01T00:00:00Z".parse().unwrap(),
            end: "2026-03-01T00:00:00Z".parse().unwrap(),
            compare_start: compare.map(|c| c.0.parse().unwrap()),
            compare_end: compare.map(|c| c.1.parse().unwrap()),
            presented: false,
        }
    }

    #[test]
    fn test_windows() {
        let (current, previous) = query(None).windows().unwrap();
        assert_eq!(current.duration().num_days(), 28);
        assert!(previous.is_none());

        let (_, previous) = query(Some(("2025-02-01T00:00:00Z", "2025-03-01T00:00:00Z")))
            .windows()
            .unwrap();
        assert_eq!(previous.unwrap().start.to_rfc3339(), "2025-02-01T00:00:00+00:00");

        let mut q = query(None);
        q.compare_end = Some(q.end);
        assert!(matches!(q.windows(), Err(ServerError::BadRequest(_))));
    }

    #[test]
    fn test_parse_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(parse_ids(&format!("{a}, {b},")).unwrap(), vec![a, b]);
        assert!(parse_ids("not-a-uuid").is_err());
    }
}

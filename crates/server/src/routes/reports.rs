use crate::error::{ServerError, ServerResult};
use crate::middleware::require_admin;
use crate::routes::{OrganizationQuery, PeriodQuery};
use crate::state::ServerState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use model::{DataState, Insight, Recommendation, Report, Window};
use ratelimit::LimiterClass;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Request to generate a report
#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    pub organization_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReportListResponse {
    pub organization_id: String,
    pub total: usize,
    pub reports: Vec<Report>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub read: bool,
}

/// Score and advice without storing a report
#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub score: u8,
    pub data_state: DataState,
    pub recommendations: Vec<Recommendation>,
    pub insights: Vec<Insight>,
}

/// Generate and store a report for an organization
///
/// Counted against the `generation` limiter per organization.
pub async fn generate_report(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<GenerateReportRequest>,
) -> ServerResult<impl IntoResponse> {
    if request.organization_id.trim().is_empty() {
        return Err(ServerError::BadRequest("organization_id is required".to_string()));
    }
    let period = Window::new(request.start, request.end)?;
    state.check_rate_limit(
        LimiterClass::Generation,
        &format!("org:{}", request.organization_id),
    )?;

    let report = analytics::generate_report(
        &state.stores,
        &request.organization_id,
        period,
        state.clock.now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(report)))
}

/// List an organization's reports, newest first
pub async fn list_reports(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<OrganizationQuery>,
) -> ServerResult<impl IntoResponse> {
    let reports = state
        .stores
        .reports
        .reports_for_organization(&query.organization_id)
        .await?;

    Ok(Json(ReportListResponse {
        organization_id: query.organization_id,
        total: reports.len(),
        reports,
    }))
}

/// Get a report by ID
pub async fn get_report(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
) -> ServerResult<impl IntoResponse> {
    let report = state
        .stores
        .reports
        .report(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("report `{id}`")))?;
    Ok(Json(report))
}

/// Mark a report read or unread
pub async fn mark_read(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<MarkReadRequest>,
) -> ServerResult<impl IntoResponse> {
    let report = state.stores.reports.set_report_read(id, request.read).await?;
    Ok(Json(report))
}

/// Delete a report (admin key required)
pub async fn delete_report(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ServerResult<impl IntoResponse> {
    require_admin(&state, &headers)?;
    state.stores.reports.delete_report(id).await?;
    tracing::info!(report_id = %id, "report_deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Score, recommendations and insights for a period
pub async fn recommendations(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PeriodQuery>,
) -> ServerResult<impl IntoResponse> {
    let (current, previous) = query.windows()?;
    let ids = query.integration_ids(&state).await?;
    let summary =
        analytics::aggregate(state.stores.points.as_ref(), &ids, current, previous).await?;

    Ok(Json(RecommendationsResponse {
        score: analytics::score(&summary),
        data_state: summary.data_state,
        recommendations: analytics::recommend(&summary),
        insights: analytics::insights(&summary),
    }))
}

use crate::error::{ServerError, ServerResult};
use crate::routes::OrganizationQuery;
use crate::state::ServerState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use model::{Integration, NewIntegration};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct IntegrationListResponse {
    pub organization_id: String,
    pub total: usize,
    pub integrations: Vec<Integration>,
}

/// Connect a platform account
///
/// Stores the integration as `pending` and starts its historical sync in
/// the background. Answers 202 without waiting for the sync.
pub async fn connect_integration(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<NewIntegration>,
) -> ServerResult<impl IntoResponse> {
    if request.organization_id.trim().is_empty() {
        return Err(ServerError::BadRequest("organization_id is required".to_string()));
    }
    if request.external_account_id.trim().is_empty() {
        return Err(ServerError::BadRequest(
            "external_account_id is required".to_string(),
        ));
    }

    // The sync is supervised; its handle is not needed here.
    let (integration, _sync) = state.sync.connect_integration(request).await?;
    Ok((StatusCode::ACCEPTED, Json(integration)))
}

/// List an organization's integrations, disconnected ones included
pub async fn list_integrations(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<OrganizationQuery>,
) -> ServerResult<impl IntoResponse> {
    let integrations = state
        .stores
        .integrations
        .integrations_for_organization(&query.organization_id)
        .await?;

    Ok(Json(IntegrationListResponse {
        organization_id: query.organization_id,
        total: integrations.len(),
        integrations,
    }))
}

/// Soft-disconnect an integration
///
/// The record and its historical data points are kept; further webhooks
/// for it are refused.
pub async fn disconnect_integration(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
) -> ServerResult<impl IntoResponse> {
    let integration = state
        .stores
        .integrations
        .disconnect_integration(id, state.clock.now())
        .await?;
    tracing::info!(integration_id = %id, "integration_disconnected");
    Ok(Json(integration))
}

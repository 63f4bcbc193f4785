use crate::error::ServerError;
use crate::state::ServerState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bizpulse::DeliveryOutcome;
use model::Platform;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Acknowledgement for an accepted delivery.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// `processed` or `duplicate`
    pub status: &'static str,
    pub event_id: Option<Uuid>,
    pub points: usize,
}

/// Receive a platform webhook
///
/// The body is taken as raw bytes: signatures cover the exact bytes sent,
/// so nothing may parse or re-encode it before verification.
pub async fn receive_webhook(
    State(state): State<Arc<ServerState>>,
    Path((platform, integration_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Ok(platform) = platform.parse::<Platform>() else {
        return ServerError::Delivery(DeliveryOutcome::UnsupportedPlatform).into_response();
    };
    let Ok(integration_id) = integration_id.parse::<Uuid>() else {
        return ServerError::Delivery(DeliveryOutcome::UnknownIntegration).into_response();
    };

    let outcome = state
        .pipeline
        .handle_delivery(platform, integration_id, &body, &headers)
        .await;

    match outcome {
        DeliveryOutcome::Processed { event_id, points } => Json(WebhookResponse {
            status: "processed",
            event_id: Some(event_id),
            points,
        })
        .into_response(),
        DeliveryOutcome::Duplicate { event_id } => Json(WebhookResponse {
            status: "duplicate",
            event_id: Some(event_id),
            points: 0,
        })
        .into_response(),
        failed => ServerError::Delivery(failed).into_response(),
    }
}

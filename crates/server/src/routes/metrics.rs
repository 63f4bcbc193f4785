use crate::error::ServerResult;
use crate::routes::PeriodQuery;
use crate::state::ServerState;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Aggregate metrics for a period and its comparison period
///
/// The response is the full summary: both windows, `data_state`, and one
/// `{current, previous, change, change_percent, trend}` entry per metric,
/// derived metrics included. `presented=true` rounds for display; trends
/// are classified before rounding either way.
pub async fn query_metrics(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PeriodQuery>,
) -> ServerResult<impl IntoResponse> {
    let (current, previous) = query.windows()?;
    let ids = query.integration_ids(&state).await?;

    let summary =
        analytics::aggregate(state.stores.points.as_ref(), &ids, current, previous).await?;
    let summary = if query.presented {
        analytics::present(&summary)
    } else {
        summary
    };

    Ok(Json(summary))
}

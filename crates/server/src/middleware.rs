use crate::error::ServerError;
use crate::state::ServerState;
use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use ratelimit::{client_ip, KeyStrategy, LimiterClass};
use std::sync::Arc;

/// API key from `X-API-Key` or `Authorization: Bearer <key>`.
pub fn api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-api-key")
        .or_else(|| headers.get(AUTHORIZATION))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// API Key authentication middleware
///
/// Valid keys are counted against the `general_api` limiter. Failed
/// attempts are counted per client address against the `auth` limiter, so
/// guessing keys gets throttled before it gets far.
pub async fn api_key_auth(
    state: axum::extract::State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let headers = request.headers();
    let (key, principal, client) = (
        api_key(headers),
        KeyStrategy::Principal.key(headers),
        client_ip(headers),
    );

    let error = match key {
        Some(key) if state.is_valid_api_key(&key) => {
            state.check_rate_limit(LimiterClass::GeneralApi, &principal)?;
            return Ok(next.run(request).await);
        }
        Some(_) => ServerError::Authentication("Invalid API key".to_string()),
        None => ServerError::Authentication(
            "API key required. Provide it in 'X-API-Key' or 'Authorization: Bearer <key>' header"
                .to_string(),
        ),
    };

    state.check_rate_limit(LimiterClass::Auth, &client)?;
    Err(error)
}

/// Fails unless the request carries an admin key.
pub fn require_admin(state: &ServerState, headers: &HeaderMap) -> Result<(), ServerError> {
    match api_key(headers) {
        Some(key) if state.is_admin_key(&key) => Ok(()),
        _ => Err(ServerError::Forbidden("admin API key required".to_string())),
    }
}

/// Request ID injection middleware
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;

    // Client-supplied ids that are not valid header values are dropped.
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Logging middleware
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let request_id = request
        .extensions()
        .get::<String>()
        .cloned()
        .unwrap_or_default();

    tracing::debug!(
        method = %method,
        path = %path,
        request_id = %request_id,
        "request_started"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis() as u64,
        request_id = %request_id,
        "request_completed"
    );

    response
}

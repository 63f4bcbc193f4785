use analytics::AnalyticsError;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bizpulse::{DeliveryOutcome, PipelineError};
use model::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use store::StoreError;

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Request timeout")]
    Timeout,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: max {0}MB allowed")]
    PayloadTooLarge(usize),

    /// A webhook delivery that did not succeed.
    #[error("{}", .0.message())]
    Delivery(DeliveryOutcome),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} not found")]
    NotFound(String),
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Delivery(outcome) => outcome.status_code(),
            ServerError::Store(err) => store_status(err),
            ServerError::Analytics(AnalyticsError::Store(err)) => store_status(err),
            ServerError::Analytics(_) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(PipelineError::Store(err)) => store_status(err),
            ServerError::Pipeline(PipelineError::Disconnected(_)) => StatusCode::CONFLICT,
            ServerError::Pipeline(_) | ServerError::Internal(_) | ServerError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::Authentication(_) => "AUTH_FAILED",
            ServerError::Forbidden(_) => "FORBIDDEN",
            ServerError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            ServerError::Timeout => "REQUEST_TIMEOUT",
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ServerError::Delivery(outcome) => delivery_code(outcome),
            ServerError::Pipeline(_) => "PIPELINE_ERROR",
            ServerError::Analytics(_) => "ANALYTICS_ERROR",
            ServerError::Store(_) => "STORE_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::NotFound(_) => "NOT_FOUND",
        }
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ServerError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            ServerError::Delivery(outcome) => outcome.retry_after_secs(),
            _ => None,
        }
    }
}

fn delivery_code(outcome: &DeliveryOutcome) -> &'static str {
    match outcome {
        DeliveryOutcome::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
        DeliveryOutcome::UnknownIntegration => "UNKNOWN_INTEGRATION",
        DeliveryOutcome::UnsupportedPlatform => "UNSUPPORTED_PLATFORM",
        DeliveryOutcome::Unauthorized(_) => "SIGNATURE_INVALID",
        DeliveryOutcome::BadRequest(_) => "INVALID_PAYLOAD",
        DeliveryOutcome::InProgress { .. } => "DELIVERY_IN_PROGRESS",
        DeliveryOutcome::PersistenceFailed(_) => "PERSISTENCE_FAILED",
        DeliveryOutcome::Processed { .. } | DeliveryOutcome::Duplicate { .. } => "OK",
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code().to_string();
        // Backend detail stays in the logs.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, code = %error_code, "request_failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        let mut response = (status, body).into_response();
        if let Some(secs) = self.retry_after_secs() {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(err: std::net::AddrParseError) -> Self {
        ServerError::Config(format!("Invalid address: {err}"))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(format!("IO error: {err}"))
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("JSON parse error: {err}"))
    }
}

impl From<ModelError> for ServerError {
    fn from(err: ModelError) -> Self {
        ServerError::BadRequest(err.to_string())
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}

//! Bizpulse Server - HTTP API for the business analytics pipeline
//!
//! This crate exposes the bizpulse pipeline over HTTP:
//!
//! - **Webhook Intake**: Signed commerce and payments deliveries, verified
//!   against the raw body and recorded idempotently
//! - **Aggregation**: Period-over-period metrics with trends
//! - **Reports**: Stored reports with score, recommendations and insights
//! - **Integrations**: Connect (with background historical sync) and
//!   disconnect platform accounts
//! - **Health & Metrics**: Liveness/readiness probes and Prometheus metrics
//!
//! # Features
//!
//! - **Authentication**: API keys on `/api/v1/*`, platform signatures on
//!   `/webhooks/*`, admin keys for destructive operations
//! - **Rate Limiting**: Fixed windows per endpoint class, with `Retry-After`
//! - **Middleware**: Compression, CORS, request ID tracking, structured logging
//! - **Configuration**: Environment variable and file-based configuration
//! - **Graceful Shutdown**: Proper signal handling for production deployments
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! ## Public Endpoints (No Authentication)
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Webhooks (Platform Signature)
//!
//! - `POST /webhooks/{platform}/{integration_id}` - Receive a delivery
//!
//! ## Protected Endpoints (API Key Required)
//!
//! - `GET /api/v1/metrics` - Aggregate metrics for a period
//! - `GET /api/v1/recommendations` - Score and recommendations for a period
//! - `POST /api/v1/reports` - Generate and store a report
//! - `GET /api/v1/reports` - List an organization's reports
//! - `GET /api/v1/reports/{id}` - Get a report
//! - `PUT /api/v1/reports/{id}/read` - Mark read or unread
//! - `DELETE /api/v1/reports/{id}` - Delete a report (admin)
//! - `POST /api/v1/integrations` - Connect an integration
//! - `GET /api/v1/integrations` - List integrations
//! - `DELETE /api/v1/integrations/{id}` - Disconnect an integration
//! - `GET /api/v1/metadata` - Server metadata

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;

//! Bizpulse Server - HTTP API for the business analytics pipeline
//!
//! This binary serves webhook intake, aggregation queries and reports with
//! authentication and rate limiting.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;

    server::start_server(config).await?;

    Ok(())
}

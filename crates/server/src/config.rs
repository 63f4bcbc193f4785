use bizpulse::{PipelineConfig, WebhookSecrets};
use ingest::IngestConfig;
use ratelimit::RateLimitSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ServerError, ServerResult};

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum request body size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// API keys accepted on `/api/v1/*`
    #[serde(default)]
    pub api_keys: HashSet<String>,

    /// Keys that may also delete reports. Admin keys are valid API keys.
    #[serde(default)]
    pub admin_api_keys: HashSet<String>,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Log level or full `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Metrics endpoint enabled
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Per-platform webhook signing secrets
    #[serde(default)]
    pub webhooks: WebhookSecrets,

    #[serde(default)]
    pub ingest: IngestConfig,

    /// One fixed-window limit per endpoint class
    #[serde(default)]
    pub rate_limits: RateLimitSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            api_keys: HashSet::new(),
            admin_api_keys: HashSet::new(),
            enable_cors: default_true(),
            log_level: default_log_level(),
            metrics_enabled: default_true(),
            webhooks: WebhookSecrets::default(),
            ingest: IngestConfig::default(),
            rate_limits: RateLimitSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `.env`, an optional `server.{toml,yaml,json}`
    /// and `BIZPULSE_SERVER__*` environment variables, in that order.
    pub fn load() -> anyhow::Result<Self> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("server").required(false))
            .add_source(
                config::Environment::with_prefix("BIZPULSE_SERVER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("api_keys")
                    .with_list_parse_key("admin_api_keys"),
            );

        let mut config: ServerConfig = builder.build()?.try_deserialize()?;

        if config.api_keys.is_empty() && config.admin_api_keys.is_empty() {
            tracing::warn!("No API keys configured, using demo key 'demo-key-12345'");
            config.api_keys.insert("demo-key-12345".to_string());
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects limits, secrets and sizes the server cannot run with.
    pub fn validate(&self) -> ServerResult<()> {
        self.pipeline_config()
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;
        self.rate_limits
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;
        if self.timeout_secs == 0 {
            return Err(ServerError::Config("timeout_secs must be greater than zero".into()));
        }
        if self.max_body_size_mb == 0 {
            return Err(ServerError::Config(
                "max_body_size_mb must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// The subset the webhook pipeline consumes.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(self.ingest.clone(), self.webhooks.clone())
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_body_size_mb() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

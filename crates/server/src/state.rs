use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use bizpulse::{EmptySource, HistoricalSource, SyncSupervisor, WebhookPipeline};
use metrics_exporter_prometheus::PrometheusHandle;
use ratelimit::{Clock, LimiterClass, MemoryCounterStore, RateLimitDecision, RateLimiters, SystemClock};
use std::sync::Arc;
use store::Stores;
use subtle::ConstantTimeEq;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Persistence, one handle per entity
    pub stores: Stores,

    /// One fixed-window limiter per endpoint class
    pub limiters: Arc<RateLimiters>,

    /// Webhook delivery handling
    pub pipeline: WebhookPipeline,

    /// Historical sync for new integrations
    pub sync: SyncSupervisor,

    pub clock: Arc<dyn Clock>,

    /// Set when the Prometheus recorder is installed
    pub prometheus: Option<PrometheusHandle>,
}

impl ServerState {
    /// In-memory stores, wall clock, and no historical source.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        Self::with_parts(
            config,
            Stores::in_memory(),
            Arc::new(SystemClock),
            Arc::new(EmptySource),
        )
    }

    /// Builds state over explicit stores, clock and history source.
    pub fn with_parts(
        config: ServerConfig,
        stores: Stores,
        clock: Arc<dyn Clock>,
        source: Arc<dyn HistoricalSource>,
    ) -> ServerResult<Self> {
        config.validate()?;

        let limiters = Arc::new(
            RateLimiters::new(
                &config.rate_limits,
                Arc::new(MemoryCounterStore::new()),
                Arc::clone(&clock),
            )
            .map_err(|e| ServerError::Config(e.to_string()))?,
        );
        let pipeline = WebhookPipeline::new(
            stores.clone(),
            Arc::clone(&limiters),
            config.pipeline_config(),
            Arc::clone(&clock),
        )?;
        let sync = SyncSupervisor::new(stores.clone(), source, Arc::clone(&clock));

        Ok(Self {
            config: Arc::new(config),
            stores,
            limiters,
            pipeline,
            sync,
            clock,
            prometheus: None,
        })
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Check if API key is valid. Admin keys are valid API keys.
    pub fn is_valid_api_key(&self, key: &str) -> bool {
        contains_ct(&self.config.api_keys, key) || self.is_admin_key(key)
    }

    pub fn is_admin_key(&self, key: &str) -> bool {
        contains_ct(&self.config.admin_api_keys, key)
    }

    /// Counts one request against `class` and fails once the window is full.
    pub fn check_rate_limit(&self, class: LimiterClass, key: &str) -> ServerResult<RateLimitDecision> {
        let decision = self.limiters.get(class).check(key);
        if decision.allowed {
            Ok(decision)
        } else {
            Err(ServerError::RateLimitExceeded {
                retry_after_secs: decision.retry_after_secs().unwrap_or(1),
            })
        }
    }
}

// Compares every candidate so timing does not reveal which prefix matched.
fn contains_ct<'a>(keys: impl IntoIterator<Item = &'a String>, key: &str) -> bool {
    keys.into_iter().fold(false, |found, candidate| {
        found | bool::from(candidate.as_bytes().ct_eq(key.as_bytes()))
    })
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
}

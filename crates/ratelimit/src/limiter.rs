use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{FailurePolicy, LimiterClass, RateLimitConfig, RateLimitSettings};
use crate::error::RateLimitError;
use crate::store::{CounterKey, CounterStore, Increment, MemoryCounterStore};

/// Default number of checks between opportunistic purges.
pub const DEFAULT_PURGE_EVERY: u64 = 1024;

/// Outcome of one [`FixedWindowLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// End of the current window.
    pub reset_at: DateTime<Utc>,
    /// Set on denial: time until the window resets.
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    /// `Retry-After` value in whole seconds, rounded up, at least 1.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after.map(|d| {
            let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
            secs.max(1)
        })
    }
}

/// Fixed-window counter limiter for one endpoint class.
///
/// Windows are aligned to the Unix epoch: a request at `now` is counted in
/// the window starting at `floor(now / window) * window`.
pub struct FixedWindowLimiter {
    namespace: String,
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    checks: AtomicU64,
    purge_every: u64,
}

impl std::fmt::Debug for FixedWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindowLimiter")
            .field("namespace", &self.namespace)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FixedWindowLimiter {
    pub fn new(
        namespace: impl Into<String>,
        config: RateLimitConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RateLimitError> {
        config.validate()?;
        Ok(Self {
            namespace: namespace.into(),
            config,
            store,
            clock,
            checks: AtomicU64::new(0),
            purge_every: DEFAULT_PURGE_EVERY,
        })
    }

    /// Purge expired windows every `n` checks; `0` disables purging.
    pub fn with_purge_every(mut self, n: u64) -> Self {
        self.purge_every = n;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counts one request for `key` and decides whether it may proceed.
    ///
    /// Never blocks and never errors; store failures resolve through the
    /// configured [`FailurePolicy`].
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let now_ms = now.timestamp_millis();
        let window_ms = i64::try_from(self.config.window.as_millis()).unwrap_or(i64::MAX);
        let window_start_ms = now_ms.div_euclid(window_ms) * window_ms;
        let reset_ms = window_start_ms.saturating_add(window_ms);
        let reset_at = DateTime::from_timestamp_millis(reset_ms).unwrap_or(now);
        let until_reset = Duration::from_millis(u64::try_from(reset_ms - now_ms).unwrap_or(0));

        self.maybe_purge(window_start_ms);

        let counter = CounterKey {
            namespace: self.namespace.clone(),
            key: key.to_string(),
            window_start_ms,
        };
        let max = self.config.max;

        match self.store.increment_below(&counter, max) {
            Ok(Increment::Counted(count)) => RateLimitDecision {
                allowed: true,
                limit: max,
                remaining: max.saturating_sub(count),
                reset_at,
                retry_after: None,
            },
            Ok(Increment::Full(_)) => {
                debug!(
                    limiter = %self.namespace,
                    key,
                    retry_after_ms = until_reset.as_millis() as u64,
                    "rate_limit_denied"
                );
                metrics::counter!("rate_limit_rejections_total", "limiter" => self.namespace.clone())
                    .increment(1);
                RateLimitDecision {
                    allowed: false,
                    limit: max,
                    remaining: 0,
                    reset_at,
                    retry_after: Some(until_reset),
                }
            }
            Err(err) => {
                let allowed = self.config.failure_policy == FailurePolicy::FailOpen;
                warn!(
                    limiter = %self.namespace,
                    error = %err,
                    allowed,
                    "rate_limit_store_failure"
                );
                RateLimitDecision {
                    allowed,
                    limit: max,
                    remaining: 0,
                    reset_at,
                    retry_after: (!allowed).then_some(until_reset),
                }
            }
        }
    }

    fn maybe_purge(&self, active_window_start_ms: i64) {
        if self.purge_every == 0 {
            return;
        }
        let n = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.purge_every != 0 {
            return;
        }
        match self.store.purge_expired(&self.namespace, active_window_start_ms) {
            Ok(0) => {}
            Ok(removed) => debug!(limiter = %self.namespace, removed, "rate_limit_purged"),
            Err(err) => warn!(limiter = %self.namespace, error = %err, "rate_limit_purge_failed"),
        }
    }
}

/// One limiter per [`LimiterClass`], sharing a store and clock.
#[derive(Debug)]
pub struct RateLimiters {
    general_api: FixedWindowLimiter,
    auth: FixedWindowLimiter,
    webhook: FixedWindowLimiter,
    generation: FixedWindowLimiter,
}

impl RateLimiters {
    pub fn new(
        settings: &RateLimitSettings,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RateLimitError> {
        let build = |class: LimiterClass| {
            FixedWindowLimiter::new(
                class.namespace(),
                settings.get(class),
                Arc::clone(&store),
                Arc::clone(&clock),
            )
        };
        Ok(Self {
            general_api: build(LimiterClass::GeneralApi)?,
            auth: build(LimiterClass::Auth)?,
            webhook: build(LimiterClass::Webhook)?,
            generation: build(LimiterClass::Generation)?,
        })
    }

    /// In-process counters and the wall clock.
    pub fn in_memory(settings: &RateLimitSettings) -> Result<Self, RateLimitError> {
        Self::new(
            settings,
            Arc::new(MemoryCounterStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn get(&self, class: LimiterClass) -> &FixedWindowLimiter {
        match class {
            LimiterClass::GeneralApi => &self.general_api,
            LimiterClass::Auth => &self.auth,
            LimiterClass::Webhook => &self.webhook,
            LimiterClass::Generation => &self.generation,
        }
    }
}

//! Limiter configuration and the per-endpoint-class presets.
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RateLimitError;

/// What to do when the counter store fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Allow the request. Suited to read endpoints.
    #[default]
    FailOpen,
    /// Deny the request. Suited to webhooks and mutations.
    FailClosed,
}

/// Configuration for one fixed-window limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub max: u32,
    /// Window length, serialized as `window_secs`.
    #[serde(rename = "window_secs", with = "crate::serde_secs")]
    pub window: Duration,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl RateLimitConfig {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// 100 requests per minute, fail-open.
    pub fn general_api() -> Self {
        Self::new(100, Duration::from_secs(60))
    }

    /// 5 requests per 15 minutes, fail-closed.
    pub fn auth() -> Self {
        Self::new(5, Duration::from_secs(15 * 60)).with_failure_policy(FailurePolicy::FailClosed)
    }

    /// 300 requests per minute, fail-closed.
    pub fn webhook() -> Self {
        Self::new(300, Duration::from_secs(60)).with_failure_policy(FailurePolicy::FailClosed)
    }

    /// 10 requests per hour, fail-closed.
    pub fn generation() -> Self {
        Self::new(10, Duration::from_secs(60 * 60)).with_failure_policy(FailurePolicy::FailClosed)
    }

    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.max == 0 {
            return Err(RateLimitError::ZeroMax);
        }
        if self.window.as_secs() == 0 {
            return Err(RateLimitError::ZeroWindow);
        }
        Ok(())
    }
}

/// Endpoint classes that each get an independent limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterClass {
    GeneralApi,
    Auth,
    Webhook,
    Generation,
}

impl LimiterClass {
    pub const ALL: [LimiterClass; 4] = [
        LimiterClass::GeneralApi,
        LimiterClass::Auth,
        LimiterClass::Webhook,
        LimiterClass::Generation,
    ];

    /// Counter namespace; keeps classes from sharing counters.
    pub fn namespace(self) -> &'static str {
        match self {
            LimiterClass::GeneralApi => "general_api",
            LimiterClass::Auth => "auth",
            LimiterClass::Webhook => "webhook",
            LimiterClass::Generation => "generation",
        }
    }

    pub fn preset(self) -> RateLimitConfig {
        match self {
            LimiterClass::GeneralApi => RateLimitConfig::general_api(),
            LimiterClass::Auth => RateLimitConfig::auth(),
            LimiterClass::Webhook => RateLimitConfig::webhook(),
            LimiterClass::Generation => RateLimitConfig::generation(),
        }
    }
}

/// One [`RateLimitConfig`] per [`LimiterClass`], as read from configuration.
///
/// Each class deserializes as an override of its preset: fields left out,
/// the failure policy included, keep the preset's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitSettings {
    pub general_api: RateLimitConfig,
    pub auth: RateLimitConfig,
    pub webhook: RateLimitConfig,
    pub generation: RateLimitConfig,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            general_api: RateLimitConfig::general_api(),
            auth: RateLimitConfig::auth(),
            webhook: RateLimitConfig::webhook(),
            generation: RateLimitConfig::generation(),
        }
    }
}

/// Field-wise override of a preset.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LimitOverride {
    max: Option<u32>,
    window_secs: Option<u64>,
    failure_policy: Option<FailurePolicy>,
}

impl LimitOverride {
    fn over(self, preset: RateLimitConfig) -> RateLimitConfig {
        RateLimitConfig {
            max: self.max.unwrap_or(preset.max),
            window: self
                .window_secs
                .map(Duration::from_secs)
                .unwrap_or(preset.window),
            failure_policy: self.failure_policy.unwrap_or(preset.failure_policy),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsOverride {
    general_api: LimitOverride,
    auth: LimitOverride,
    webhook: LimitOverride,
    generation: LimitOverride,
}

impl<'de> Deserialize<'de> for RateLimitSettings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let o = SettingsOverride::deserialize(deserializer)?;
        Ok(Self {
            general_api: o.general_api.over(LimiterClass::GeneralApi.preset()),
            auth: o.auth.over(LimiterClass::Auth.preset()),
            webhook: o.webhook.over(LimiterClass::Webhook.preset()),
            generation: o.generation.over(LimiterClass::Generation.preset()),
        })
    }
}

impl RateLimitSettings {
    pub fn get(&self, class: LimiterClass) -> RateLimitConfig {
        match class {
            LimiterClass::GeneralApi => self.general_api,
            LimiterClass::Auth => self.auth,
            LimiterClass::Webhook => self.webhook,
            LimiterClass::Generation => self.generation,
        }
    }

    pub fn validate(&self) -> Result<(), RateLimitError> {
        LimiterClass::ALL
            .iter()
            .try_for_each(|class| self.get(*class).validate())
    }
}

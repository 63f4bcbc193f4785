//! Configuration types for webhook ingest.
//!
//! [`IngestConfig`] controls how deliveries are authenticated and which
//! topics count as revenue. It is cheap to clone and deserializes from the
//! server's configuration file.
//!
//! ```rust
//! use ingest::{IngestConfig, OrderRecognition};
//!
//! let config = IngestConfig::default();
//! assert_eq!(config.signature_tolerance_secs, 300);
//! assert_eq!(config.commerce_order_topic, OrderRecognition::Paid);
//! config.validate().expect("defaults are valid");
//! ```
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which commerce topic recognizes an order as revenue.
///
/// Platforms emit both `orders/create` and `orders/paid` for the same order;
/// counting both would double the revenue, so exactly one of them is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderRecognition {
    /// Recognize on `orders/create`.
    Created,
    /// Recognize on `orders/paid`.
    #[default]
    Paid,
}

impl OrderRecognition {
    pub fn topic(self) -> &'static str {
        match self {
            OrderRecognition::Created => "orders/create",
            OrderRecognition::Paid => "orders/paid",
        }
    }
}

/// Runtime configuration for webhook ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum allowed distance between a timestamped signature and now.
    ///
    /// Default: `300` (5 minutes)
    pub signature_tolerance_secs: u64,

    /// Commerce topic that yields revenue and order observations.
    ///
    /// Default: [`OrderRecognition::Paid`]
    pub commerce_order_topic: OrderRecognition,

    /// Emit an `orders` observation for every successful payment.
    ///
    /// Off by default: stores that also connect a commerce platform would
    /// otherwise count each sale twice.
    pub count_payments_as_orders: bool,

    /// How long a claimed delivery may stay unsettled before a redelivery
    /// may take the claim over.
    ///
    /// Default: `300` (5 minutes)
    pub claim_lease_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            signature_tolerance_secs: 300,
            commerce_order_topic: OrderRecognition::default(),
            count_payments_as_orders: false,
            claim_lease_secs: 300,
        }
    }
}

impl IngestConfig {
    pub fn signature_tolerance(&self) -> Duration {
        Duration::from_secs(self.signature_tolerance_secs)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }

    /// Checks the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signature_tolerance_secs == 0 {
            return Err(ConfigError::ZeroTolerance);
        }
        if self.claim_lease_secs == 0 {
            return Err(ConfigError::ZeroClaimLease);
        }
        Ok(())
    }
}

/// Configuration validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A zero tolerance rejects every timestamped delivery.
    #[error("signature_tolerance_secs must be greater than zero")]
    ZeroTolerance,
    /// A zero lease lets concurrent redeliveries apply the same event twice.
    #[error("claim_lease_secs must be greater than zero")]
    ZeroClaimLease,
}

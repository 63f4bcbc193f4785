use thiserror::Error;

/// Invariant violations detected while constructing model values.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ModelError {
    /// Count-like metrics must never go negative.
    #[error("metric {metric} must be non-negative, got {value}")]
    NegativeValue { metric: &'static str, value: f64 },

    /// NaN and infinities are never valid observations.
    #[error("metric {metric} has non-finite value")]
    NonFiniteValue { metric: &'static str },

    /// Monetary observations carry their currency in metadata.
    #[error("metric {metric} requires a `currency` entry in metadata")]
    MissingCurrency { metric: &'static str },

    /// A window's end must come strictly after its start.
    #[error("window end {end} is not after start {start}")]
    EmptyWindow { start: String, end: String },

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
}

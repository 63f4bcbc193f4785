//! Error types produced by the ingest crate.
//!
//! Verification failures are values, not panics: every way a delivery can fail
//! authentication maps to its own [`SignatureError`] variant so the caller can
//! log exactly why a platform's signature was rejected (a rotated secret looks
//! different from a replayed capture).
//!
//! # Error Categories
//!
//! | Error | Category | HTTP |
//! |-------|----------|------|
//! | [`SignatureError::MissingHeader`] | Authentication | 401 |
//! | [`SignatureError::MalformedHeader`] | Authentication | 401 |
//! | [`SignatureError::MissingTimestamp`] | Authentication | 401 |
//! | [`SignatureError::MissingSignature`] | Authentication | 401 |
//! | [`SignatureError::TimestampOutsideTolerance`] | Authentication (replay) | 401 |
//! | [`SignatureError::Mismatch`] | Authentication | 401 |
//! | [`SignatureError::EmptySecret`] | Misconfiguration | 401 |
//! | [`EventError::InvalidJson`] | Validation | 400 |
//! | [`EventError::MissingTopic`] | Validation | 400 |
//! | [`ExtractError::UnsupportedPlatform`] | Routing | 404 |
//!
//! # Pattern Matching
//!
//! ```rust
//! use ingest::SignatureError;
//!
//! fn describe(error: &SignatureError) -> &'static str {
//!     match error {
//!         SignatureError::TimestampOutsideTolerance { .. } => "stale or replayed delivery",
//!         SignatureError::Mismatch => "wrong secret or tampered body",
//!         _ => "malformed delivery",
//!     }
//! }
//!
//! assert_eq!(describe(&SignatureError::Mismatch), "wrong secret or tampered body");
//! ```
use model::Platform;
use thiserror::Error;

/// Reasons a webhook signature was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SignatureError {
    /// The platform's signature header was absent or blank.
    #[error("missing signature header `{0}`")]
    MissingHeader(&'static str),

    /// The header is present but not in the platform's format.
    #[error("malformed signature header: {0}")]
    MalformedHeader(String),

    /// Timestamped scheme: no `t=` element.
    #[error("signature header has no timestamp")]
    MissingTimestamp,

    /// Timestamped scheme: no `v1=` element.
    #[error("signature header has no v1 signature")]
    MissingSignature,

    /// Timestamped scheme: the signed timestamp is too far from now.
    ///
    /// Rejects replays of captured deliveries.
    #[error("signature timestamp skew of {skew_secs}s exceeds tolerance")]
    TimestampOutsideTolerance { skew_secs: i64 },

    /// Digest does not match the body under the configured secret.
    #[error("signature mismatch")]
    Mismatch,

    /// No secret configured for the platform.
    #[error("webhook secret is empty")]
    EmptySecret,
}

impl SignatureError {
    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SignatureError::MissingHeader(_) => "missing_header",
            SignatureError::MalformedHeader(_) => "malformed_header",
            SignatureError::MissingTimestamp => "missing_timestamp",
            SignatureError::MissingSignature => "missing_signature",
            SignatureError::TimestampOutsideTolerance { .. } => "timestamp_outside_tolerance",
            SignatureError::Mismatch => "mismatch",
            SignatureError::EmptySecret => "empty_secret",
        }
    }
}

/// Failure to turn a verified delivery into a structured event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// Body passed verification but is not valid JSON.
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    /// Neither headers nor payload name the event type.
    #[error("delivery does not name its topic")]
    MissingTopic,
}

/// The platform has no webhook scheme.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExtractError {
    #[error("platform `{0}` does not deliver webhooks")]
    UnsupportedPlatform(Platform),
}

use thiserror::Error;

/// Errors raised by limiter configuration or the counter store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RateLimitError {
    /// The backing store could not read or update a counter.
    ///
    /// The limiter never surfaces this to callers; it applies the
    /// configured [`FailurePolicy`](crate::FailurePolicy) instead.
    #[error("counter store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("rate limit max must be greater than zero")]
    ZeroMax,

    #[error("rate limit window must be at least one second")]
    ZeroWindow,
}

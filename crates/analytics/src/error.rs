use model::ModelError;
use store::StoreError;
use thiserror::Error;

/// Failures while aggregating or generating reports.
///
/// Business conditions (no data, zero denominators) are never errors; only
/// the store or an invalid window can fail a request.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AnalyticsError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

//! Persistence interfaces for the bizpulse pipeline.
//!
//! The core never talks to a database directly. It depends on four narrow
//! traits, one per entity, and receives them bundled in [`Stores`]:
//!
//! - [`IntegrationStore`] - connected accounts, unique per (organization, platform)
//! - [`WebhookEventStore`] - delivery audit log and the atomic idempotency claim
//! - [`DataPointStore`] - append-only observations and range sums
//! - [`ReportStore`] - generated reports and their read flag
//!
//! [`MemoryStore`] implements all four and enforces the same uniqueness
//! rules a database backend would express as unique indexes.
#![forbid(unsafe_code)]

use std::sync::Arc;

mod error;
mod memory;
mod traits;

pub use crate::error::StoreError;
pub use crate::memory::MemoryStore;
pub use crate::traits::{Claim, DataPointStore, IntegrationStore, ReportStore, WebhookEventStore};

/// One handle per store trait. Cheap to clone.
#[derive(Clone)]
pub struct Stores {
    pub integrations: Arc<dyn IntegrationStore>,
    pub events: Arc<dyn WebhookEventStore>,
    pub points: Arc<dyn DataPointStore>,
    pub reports: Arc<dyn ReportStore>,
}

impl Stores {
    /// Every trait served by one [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }

    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: IntegrationStore + WebhookEventStore + DataPointStore + ReportStore + 'static,
    {
        Self {
            integrations: backend.clone(),
            events: backend.clone(),
            points: backend.clone(),
            reports: backend,
        }
    }

    /// Replaces the data point store, keeping the others.
    pub fn with_points(mut self, points: Arc<dyn DataPointStore>) -> Self {
        self.points = points;
        self
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

//! Fixed-window request rate limiting.
//!
//! Each endpoint class gets its own [`FixedWindowLimiter`] with a separate
//! counter namespace, so a burst of webhook deliveries never eats into the
//! budget for report generation. Counters live behind the [`CounterStore`]
//! trait and time comes from a [`Clock`], which keeps every decision
//! deterministic under test.
//!
//! | Class | Preset | On store failure |
//! |-------|--------|------------------|
//! | `general_api` | 100 / minute | allow |
//! | `auth` | 5 / 15 minutes | deny |
//! | `webhook` | 300 / minute | deny |
//! | `generation` | 10 / hour | deny |
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ratelimit::{FixedWindowLimiter, ManualClock, MemoryCounterStore, RateLimitConfig};
//!
//! let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
//! let limiter = FixedWindowLimiter::new(
//!     "demo",
//!     RateLimitConfig::new(2, Duration::from_secs(60)),
//!     Arc::new(MemoryCounterStore::new()),
//!     clock.clone(),
//! )
//! .unwrap();
//!
//! assert!(limiter.check("client").allowed);
//! assert!(limiter.check("client").allowed);
//! assert!(!limiter.check("client").allowed);
//!
//! clock.advance(Duration::from_secs(60));
//! assert!(limiter.check("client").allowed);
//! ```
#![forbid(unsafe_code)]

mod clock;
mod config;
mod error;
mod key;
mod limiter;
mod serde_secs;
mod store;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{FailurePolicy, LimiterClass, RateLimitConfig, RateLimitSettings};
pub use crate::error::RateLimitError;
pub use crate::key::{client_ip, KeyStrategy, ANONYMOUS};
pub use crate::limiter::{FixedWindowLimiter, RateLimitDecision, RateLimiters, DEFAULT_PURGE_EVERY};
pub use crate::store::{CounterKey, CounterStore, Increment, MemoryCounterStore};

//! # Relief Runtime
//!
//! Runtime implementations for the relief capacity-consistency engine.
//!
//! This crate provides the imperative shell around the pure core: the
//! in-memory document store, the event broadcaster, bounded retry for
//! optimistic-concurrency conflicts and Prometheus metrics.
//!
//! ## Core Components
//!
//! - **`InMemoryShelterStore`**: per-document locking, all-or-nothing commits
//! - **`EventBroadcaster`**: channel-filtered, at-most-once event fan-out
//! - **`RetryPolicy`**: exponential backoff with jitter for conflict retries
//! - **`PrometheusMetrics`**: recorder installation and rendering
//!
//! ## Example
//!
//! ```ignore
//! use relief_runtime::{EventBroadcaster, InMemoryShelterStore, RetryPolicy};
//!
//! let store = Arc::new(InMemoryShelterStore::new());
//! let events = Arc::new(EventBroadcaster::new(1024));
//! let retry = RetryPolicy::default();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Event fan-out
pub mod broadcaster;

/// In-memory document store
pub mod memory_store;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

pub use broadcaster::EventBroadcaster;
pub use memory_store::InMemoryShelterStore;
pub use metrics::PrometheusMetrics;
pub use retry::RetryPolicy;

//! Prometheus metrics for the relief runtime.
//!
//! Runtime components record into the global `metrics` recorder:
//! - Store commits and optimistic-concurrency conflicts
//! - Event broadcaster publishes and dropped deliveries
//! - Retry attempts
//!
//! Business counters (admissions, discharges, transfers) live in the
//! application crate. [`PrometheusMetrics::install`] wires up the exporter
//! and returns a handle the HTTP layer renders at `/metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use relief_runtime::metrics::PrometheusMetrics;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::install()?;
//! let body = metrics.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installed Prometheus recorder.
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: PrometheusHandle,
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

impl PrometheusMetrics {
    /// Install the Prometheus recorder as the process-wide `metrics` recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if a recorder is already installed.
    /// Call this once, at startup.
    pub fn install() -> Result<Self, MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = builder
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        register_metrics();
        tracing::info!("Prometheus recorder installed");
        Ok(Self { handle })
    }

    /// Render current metrics in the Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Register runtime metric descriptions.
fn register_metrics() {
    describe_counter!("relief_store_commits_total", "Store commits by result (ok, conflict, error)");
    describe_histogram!("relief_store_commit_duration_seconds", "Time taken to commit a transaction");

    describe_counter!("relief_events_published_total", "Events handed to the broadcaster, by event name");
    describe_counter!(
        "relief_events_dropped_total",
        "Events a lagging subscriber never received"
    );
    describe_counter!(
        "relief_event_publish_errors_total",
        "Publishes that failed and were swallowed"
    );

    describe_counter!("relief_retry_attempts_total", "Operations retried after a conflict");
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record a commit outcome.
    pub fn record_commit(result: &'static str, duration: Duration) {
        counter!("relief_store_commits_total", "result" => result).increment(1);
        histogram!("relief_store_commit_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Broadcaster metrics recorder.
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    /// Record a publish.
    pub fn record_published(event: &'static str) {
        counter!("relief_events_published_total", "event" => event).increment(1);
    }

    /// Record deliveries lost to a lagging subscriber.
    pub fn record_dropped(count: u64) {
        counter!("relief_events_dropped_total").increment(count);
    }

    /// Record a swallowed publish failure.
    pub fn record_publish_error() {
        counter!("relief_event_publish_errors_total").increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("relief_retry_attempts_total").increment(1);
    }
}

//! Business metrics for the relief engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `relief_admissions_total{outcome}` - Admission attempts by outcome
//! - `relief_discharges_total{outcome}` - Discharges (discharged, already_discharged)
//! - `relief_transfers_total{outcome}` - Transfer attempts by outcome
//! - `relief_guest_removals_total` - Guest records deleted
//! - `relief_commit_conflicts_total{operation}` - Optimistic-concurrency conflicts seen
//! - `relief_capacity_alerts_total` - Centers that just became full
//!
//! ## Gauges
//! - `relief_center_occupancy{center_id}` - Occupancy after the last committed change

use metrics::{describe_counter, describe_gauge};
use relief_core::center::Center;
use relief_core::error::ReliefError;

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "relief_admissions_total",
        "Admission attempts by outcome (admitted, center_full, rejected, error)"
    );
    describe_counter!(
        "relief_discharges_total",
        "Discharges by outcome (discharged, already_discharged)"
    );
    describe_counter!(
        "relief_transfers_total",
        "Transfer attempts by outcome (transferred, center_full, rejected, error)"
    );
    describe_counter!("relief_guest_removals_total", "Guest records deleted");
    describe_counter!(
        "relief_commit_conflicts_total",
        "Optimistic-concurrency conflicts, by operation"
    );
    describe_counter!(
        "relief_capacity_alerts_total",
        "Capacity notifications sent to center managers"
    );
    describe_gauge!(
        "relief_center_occupancy",
        "Current occupancy per center after the last committed change"
    );

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Outcome label for a failed admission or transfer.
#[must_use]
pub const fn failure_outcome(err: &ReliefError) -> &'static str {
    match err {
        ReliefError::CenterFull { .. } | ReliefError::CapacityExceeded { .. } => "center_full",
        ReliefError::Validation(_)
        | ReliefError::NotFound { .. }
        | ReliefError::Forbidden(_)
        | ReliefError::Unauthenticated(_)
        | ReliefError::SameCenter { .. } => "rejected",
        _ => "error",
    }
}

/// Record an admission attempt.
pub fn record_admission(outcome: &'static str) {
    metrics::counter!("relief_admissions_total", "outcome" => outcome).increment(1);
}

/// Record a discharge.
pub fn record_discharge(outcome: &'static str) {
    metrics::counter!("relief_discharges_total", "outcome" => outcome).increment(1);
}

/// Record a transfer attempt.
pub fn record_transfer(outcome: &'static str) {
    metrics::counter!("relief_transfers_total", "outcome" => outcome).increment(1);
}

/// Record a guest removal.
pub fn record_removal() {
    metrics::counter!("relief_guest_removals_total").increment(1);
}

/// Record a commit that lost an optimistic-concurrency race.
pub fn record_conflict(operation: &'static str) {
    metrics::counter!("relief_commit_conflicts_total", "operation" => operation).increment(1);
    tracing::debug!(operation, "Recorded commit conflict");
}

/// Record a capacity notification.
pub fn record_capacity_alert() {
    metrics::counter!("relief_capacity_alerts_total").increment(1);
}

/// Update the occupancy gauge for a center.
pub fn update_center_occupancy(center: &Center) {
    metrics::gauge!("relief_center_occupancy", "center_id" => center.id.to_string())
        .set(f64::from(center.current_occupancy));
}

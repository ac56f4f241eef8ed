//! Application services - the capacity-consistency engine.
//!
//! - [`CenterLedger`]: center documents and their occupancy counters
//! - [`GuestRegistry`]: guest records, independent of capacity bookkeeping
//! - [`AdmissionCoordinator`]: the only place a guest change and a center
//!   change are committed together
//!
//! Every service shares one [`Context`]: the store, the event bus, the clock,
//! the identifier generator and the conflict retry policy.

mod coordinator;
mod ledger;
mod registry;

pub use coordinator::{AdmissionCoordinator, DischargeOutcome};
pub use ledger::{CenterLedger, capacity_alert};
pub use registry::GuestRegistry;

use crate::config::StatsConfig;
use crate::metrics::record_conflict;
use crate::projections::StatsAggregator;
use relief_core::environment::{Clock, IdGenerator};
use relief_core::error::ReliefError;
use relief_core::event::{EventEnvelope, ShelterEvent};
use relief_core::event_bus::EventBus;
use relief_core::store::{ShelterStore, Transaction};
use relief_runtime::RetryPolicy;
use relief_runtime::metrics::{BroadcastMetrics, RetryMetrics, StoreMetrics};
use relief_runtime::retry::retry_with_predicate;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

// ============================================================================
// Shared context
// ============================================================================

/// Collaborators shared by every service.
#[derive(Clone)]
pub struct Context {
    /// Document store
    pub store: Arc<dyn ShelterStore>,
    /// Event fan-out
    pub events: Arc<dyn EventBus>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Identifier source
    pub ids: Arc<dyn IdGenerator>,
    /// Retries after an optimistic-concurrency conflict
    pub retry: RetryPolicy,
}

impl Context {
    /// Creates a new `Context`
    #[must_use]
    pub fn new(
        store: Arc<dyn ShelterStore>,
        events: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            events,
            clock,
            ids,
            retry,
        }
    }

    /// Commit `tx`, recording the outcome.
    pub(crate) async fn commit(
        &self,
        operation: &'static str,
        tx: Transaction,
    ) -> Result<(), ReliefError> {
        let started = Instant::now();
        let result = self.store.commit(tx).await.map_err(ReliefError::from);
        let label = match &result {
            Ok(()) => "ok",
            Err(ReliefError::Conflict(_)) => {
                record_conflict(operation);
                "conflict"
            }
            Err(_) => "error",
        };
        StoreMetrics::record_commit(label, started.elapsed());
        result
    }

    /// Run `attempt` until it stops failing with a conflict or the retry
    /// budget runs out. Every other error returns immediately.
    pub(crate) async fn retrying<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, ReliefError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ReliefError>>,
    {
        let mut tries = 0_usize;
        retry_with_predicate(
            &self.retry,
            || {
                tries += 1;
                if tries > 1 {
                    RetryMetrics::record_attempt();
                    tracing::debug!(operation, "retrying after conflict");
                }
                attempt()
            },
            ReliefError::is_retryable,
        )
        .await
    }

    /// Publish after a successful commit. Failures are logged and swallowed.
    pub(crate) async fn publish<I>(&self, events: I)
    where
        I: IntoIterator<Item = ShelterEvent>,
    {
        let now = self.clock.now();
        for event in events {
            let name = event.name();
            if let Err(err) = self.events.publish(EventEnvelope::route(event, now)).await {
                BroadcastMetrics::record_publish_error();
                tracing::warn!(event = name, error = %err, "event publish failed");
            }
        }
    }
}

// ============================================================================
// Service bundle
// ============================================================================

/// Every service, wired to one [`Context`].
#[derive(Clone)]
pub struct Services {
    /// Center Ledger
    pub ledger: Arc<CenterLedger>,
    /// Guest Registry
    pub registry: Arc<GuestRegistry>,
    /// Admission Coordinator
    pub coordinator: Arc<AdmissionCoordinator>,
    /// Stats Aggregator
    pub stats: Arc<StatsAggregator>,
    /// The shared context
    pub context: Context,
}

impl Services {
    /// Wire every service to `context`.
    #[must_use]
    pub fn new(context: Context, stats: StatsConfig) -> Self {
        let ledger = Arc::new(CenterLedger::new(context.clone()));
        let registry = Arc::new(GuestRegistry::new(context.clone()));
        let coordinator = Arc::new(AdmissionCoordinator::new(
            context.clone(),
            Arc::clone(&ledger),
            Arc::clone(&registry),
        ));
        let stats = Arc::new(StatsAggregator::new(
            Arc::clone(&context.store),
            Arc::clone(&context.clock),
            stats,
        ));

        Self {
            ledger,
            registry,
            coordinator,
            stats,
            context,
        }
    }
}

//! Application state for the relief HTTP server.
//!
//! Handlers take the whole [`AppState`] or, through [`FromRef`], just the
//! piece they need (the store for readiness, the event bus for `/ws`).

use crate::app::Services;
use axum::extract::FromRef;
use relief_core::event_bus::EventBus;
use relief_core::store::ShelterStore;
use relief_runtime::PrometheusMetrics;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; every field is reference-counted.
#[derive(Clone)]
pub struct AppState {
    /// Engine services
    pub services: Services,

    /// Prometheus handle; `None` when metrics are disabled
    pub metrics: Option<PrometheusMetrics>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(services: Services, metrics: Option<PrometheusMetrics>) -> Self {
        Self { services, metrics }
    }
}

impl FromRef<AppState> for Arc<dyn ShelterStore> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.services.context.store)
    }
}

impl FromRef<AppState> for Arc<dyn EventBus> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.services.context.events)
    }
}

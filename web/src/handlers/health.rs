//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use axum::{Json, extract::State, http::StatusCode};
use relief_core::center::CenterId;
use relief_core::store::ShelterStore;
use serde::Serialize;
use std::sync::Arc;

/// Liveness body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Liveness: the process is up. Dependencies are not checked.
///
/// ```text
/// GET /health
/// {"status":"ok","version":"0.1.0"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Readiness body.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Whether traffic should be routed here
    pub ready: bool,
    /// Whether the store answered a lookup
    pub storage: bool,
    /// Store error, when not ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Readiness: the store answers a point lookup.
///
/// - 200 OK: ready
/// - 503 Service Unavailable: the store failed
///
/// ```text
/// GET /ready
/// {"ready":true,"storage":true}
/// ```
pub async fn readiness_check(
    State(store): State<Arc<dyn ShelterStore>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    match store.load_center(CenterId::new()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                storage: true,
                error: None,
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    ready: false,
                    storage: false,
                    error: Some(err.to_string()),
                }),
            )
        }
    }
}

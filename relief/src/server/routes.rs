//! Router configuration for the relief server.

use super::state::AppState;
use crate::api::{centers, guests, stats};
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use relief_web::handlers::{health_check, readiness_check, websocket};
use relief_web::request_id_layer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// ```text
/// /health, /ready             liveness and storage readiness
/// /metrics                    Prometheus text format
/// /ws                         lifecycle events over WebSocket
/// /api/centers/...            Center Ledger
/// /api/guests/...             Admission Coordinator and Guest Registry
/// /api/stats/...              Stats Aggregator
/// ```
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Centers
        .route("/centers", post(centers::create_center).get(centers::list_centers))
        .route(
            "/centers/:id",
            get(centers::get_center)
                .put(centers::update_center)
                .delete(centers::delete_center),
        )
        .route("/centers/:id/supplies", patch(centers::update_supplies))
        .route("/centers/:id/availability", get(centers::get_availability))
        .route("/centers/:id/guests", get(centers::center_guests))
        // Guests
        .route("/guests", post(guests::admit_guest).get(guests::list_guests))
        .route(
            "/guests/:id",
            get(guests::get_guest)
                .put(guests::update_guest)
                .delete(guests::delete_guest),
        )
        .route("/guests/:id/discharge", post(guests::discharge_guest))
        .route("/guests/:id/transfer", post(guests::transfer_guest))
        // Statistics (read side)
        .route("/stats", get(stats::system_stats))
        .route("/stats/centers/:id", get(stats::center_stats))
        .route("/stats/shortages", get(stats::shortage_report))
        .route("/stats/guests", get(stats::guest_rollup))
        .route("/stats/trends", get(stats::trends));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(render_metrics))
        .route("/ws", get(websocket::handle))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}

/// `GET /metrics`: 404 when the recorder is not installed.
async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(metrics) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            metrics.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

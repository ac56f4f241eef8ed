//! Statistics endpoints.
//!
//! - GET /api/stats - System totals
//! - GET /api/stats/centers/:id - One center
//! - GET /api/stats/shortages - Centers with supplies below the threshold
//! - GET /api/stats/guests - Guest counts per center
//! - GET /api/stats/trends?lookback_hours=&bucket_minutes= - Activity buckets
//!
//! Public, recomputed on every request.

#![allow(clippy::missing_errors_doc)]

use super::{center_id, query};
use crate::projections::{CenterStats, GuestRollup, ShortageReport, SystemStats, TrendQuery, Trends};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use relief_web::AppError;

/// System totals.
///
/// ```bash
/// curl http://localhost:8080/api/stats
/// ```
///
/// ```json
/// {
///   "total_centers": 3, "total_capacity": 150, "total_occupancy": 120,
///   "available_space": 30, "occupancy_rate": 80.0, "critical_centers": 1,
///   "supply_shortage_centers": 2, "recently_updated": 3,
///   "by_status": { "active": 2, "inactive": 0, "full": 1 },
///   "generated_at": "..."
/// }
/// ```
pub async fn system_stats(State(state): State<AppState>) -> Result<Json<SystemStats>, AppError> {
    Ok(Json(state.services.stats.system_stats().await?))
}

/// One center.
pub async fn center_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CenterStats>, AppError> {
    Ok(Json(state.services.stats.center_stats(center_id(&id)?).await?))
}

/// Resource-shortage report.
pub async fn shortage_report(
    State(state): State<AppState>,
) -> Result<Json<ShortageReport>, AppError> {
    Ok(Json(state.services.stats.shortage_report().await?))
}

/// Guest counts per center.
pub async fn guest_rollup(State(state): State<AppState>) -> Result<Json<GuestRollup>, AppError> {
    Ok(Json(state.services.stats.guest_rollup().await?))
}

/// Admissions, discharges, transfers and removals per time bucket.
///
/// `422 VALIDATION_ERROR` for a zero bucket width, a lookback shorter than
/// one bucket, or more than 1000 buckets.
pub async fn trends(
    State(state): State<AppState>,
    params: Result<Query<TrendQuery>, QueryRejection>,
) -> Result<Json<Trends>, AppError> {
    Ok(Json(state.services.stats.trends(query(params)?).await?))
}

//! Center endpoints.
//!
//! - POST /api/centers - Create a center
//! - GET /api/centers - List centers
//! - GET /api/centers/:id - Get one center
//! - PUT /api/centers/:id - Update a center
//! - DELETE /api/centers/:id - Delete an empty center
//! - PATCH /api/centers/:id/supplies - Merge supply levels
//! - GET /api/centers/:id/availability - Capacity snapshot
//! - GET /api/centers/:id/guests - Guests registered at the center
//!
//! Reads are public. Writes need an authenticated caller allowed to manage
//! the center.

#![allow(clippy::missing_errors_doc)]

use super::center_id;
use crate::server::state::AppState;
use crate::types::{CenterPatch, NewCenter, SupplyUpdate};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use relief_core::center::{Availability, Center};
use relief_core::guest::Guest;
use relief_web::{AppError, CurrentActor, Payload};

/// Create a center.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/centers \
///   -H 'x-user-id: rc-1' -H 'x-user-role: rescue-center' \
///   -H 'content-type: application/json' \
///   -d '{"name":"Riverside","location":{"address":"1 River Rd","point":{"lat":9.9,"lon":76.2}},"total_capacity":50}'
/// ```
pub async fn create_center(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Payload(draft): Payload<NewCenter>,
) -> Result<(StatusCode, Json<Center>), AppError> {
    let center = state.services.ledger.create_center(&actor, draft).await?;
    Ok((StatusCode::CREATED, Json(center)))
}

/// List every center, ordered by name.
pub async fn list_centers(State(state): State<AppState>) -> Result<Json<Vec<Center>>, AppError> {
    Ok(Json(state.services.ledger.list_centers().await?))
}

/// Get one center.
pub async fn get_center(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Center>, AppError> {
    let center = state.services.ledger.get_center(center_id(&id)?).await?;
    Ok(Json(center))
}

/// Apply a partial update. Occupancy cannot be set this way.
pub async fn update_center(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentActor(actor): CurrentActor,
    Payload(patch): Payload<CenterPatch>,
) -> Result<Json<Center>, AppError> {
    let center = state
        .services
        .ledger
        .update_center(&actor, center_id(&id)?, patch)
        .await?;
    Ok(Json(center))
}

/// Delete a center. Fails with `409 CENTER_NOT_EMPTY` while guests remain.
pub async fn delete_center(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentActor(actor): CurrentActor,
) -> Result<StatusCode, AppError> {
    state
        .services
        .ledger
        .delete_center(&actor, center_id(&id)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Merge supply levels into the center's stock.
///
/// ```bash
/// curl -X PATCH http://localhost:8080/api/centers/$ID/supplies \
///   -H 'x-user-id: gov-1' -H 'x-user-role: government' \
///   -H 'content-type: application/json' \
///   -d '{"supplies":{"water":15,"food":60}}'
/// ```
pub async fn update_supplies(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentActor(actor): CurrentActor,
    Payload(update): Payload<SupplyUpdate>,
) -> Result<Json<Center>, AppError> {
    let center = state
        .services
        .ledger
        .update_supplies(&actor, center_id(&id)?, update)
        .await?;
    Ok(Json(center))
}

/// Capacity snapshot.
///
/// ```json
/// { "current_occupancy": 45, "total_capacity": 50, "available_capacity": 5, "occupancy_percentage": 90.0 }
/// ```
pub async fn get_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Availability>, AppError> {
    let availability = state.services.ledger.get_availability(center_id(&id)?).await?;
    Ok(Json(availability))
}

/// Guests registered at a center, active and discharged.
pub async fn center_guests(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentActor(_actor): CurrentActor,
) -> Result<Json<Vec<Guest>>, AppError> {
    let id = state.services.ledger.get_center(center_id(&id)?).await?.id;
    Ok(Json(state.services.registry.find_by_center(id).await?))
}

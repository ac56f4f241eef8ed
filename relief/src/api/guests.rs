//! Guest endpoints.
//!
//! - POST /api/guests - Admit a guest (takes a slot at the center)
//! - GET /api/guests?center_id=&status=&q= - List or search guests
//! - GET /api/guests/:id - Get one guest
//! - PUT /api/guests/:id - Update; status and center changes are routed
//!   through discharge and transfer
//! - DELETE /api/guests/:id - Delete, releasing the slot of an active guest
//! - POST /api/guests/:id/discharge - Discharge
//! - POST /api/guests/:id/transfer - Move to another center
//!
//! Every endpoint needs an authenticated caller.

#![allow(clippy::missing_errors_doc)]

use super::query;
use crate::app::DischargeOutcome;
use crate::server::state::AppState;
use crate::types::{AdmitRequest, GuestFilter, GuestUpdate, TransferRequest};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use relief_core::guest::{Guest, GuestId};
use relief_web::{AppError, CurrentActor, Payload};

/// Admit a guest.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/guests \
///   -H 'x-user-id: rc-1' -H 'x-user-role: rescue-center' \
///   -H 'content-type: application/json' \
///   -d '{"center_id":"...","first_name":"Ada","last_name":"Lovelace","allergies":["penicillin"]}'
/// ```
///
/// `409 CENTER_FULL` when no slot is free; nothing is written in that case.
pub async fn admit_guest(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Payload(request): Payload<AdmitRequest>,
) -> Result<(StatusCode, Json<Guest>), AppError> {
    let guest = state.services.coordinator.admit(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(guest)))
}

/// List guests, optionally filtered by center, status and a search term.
pub async fn list_guests(
    State(state): State<AppState>,
    CurrentActor(_actor): CurrentActor,
    filter: Result<Query<GuestFilter>, QueryRejection>,
) -> Result<Json<Vec<Guest>>, AppError> {
    let guests = state.services.registry.list(query(filter)?).await?;
    Ok(Json(guests))
}

/// Get one guest.
pub async fn get_guest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentActor(_actor): CurrentActor,
) -> Result<Json<Guest>, AppError> {
    let guest = state.services.registry.find_by_id(&GuestId::new(id)).await?;
    Ok(Json(guest))
}

/// Update a guest.
pub async fn update_guest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentActor(actor): CurrentActor,
    Payload(update): Payload<GuestUpdate>,
) -> Result<Json<Guest>, AppError> {
    let guest = state
        .services
        .coordinator
        .update_guest(&actor, &GuestId::new(id), update)
        .await?;
    Ok(Json(guest))
}

/// Delete a guest. Returns the removed record.
pub async fn delete_guest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Guest>, AppError> {
    let guest = state
        .services
        .coordinator
        .delete_guest(&actor, &GuestId::new(id))
        .await?;
    Ok(Json(guest))
}

/// Discharge a guest.
///
/// Repeating the call is harmless:
///
/// ```json
/// { "outcome": "already_discharged", "guest": { ... } }
/// ```
pub async fn discharge_guest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<DischargeOutcome>, AppError> {
    let outcome = state
        .services
        .coordinator
        .discharge(&actor, &GuestId::new(id))
        .await?;
    Ok(Json(outcome))
}

/// Move a guest to another center.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/guests/$ID/transfer \
///   -H 'x-user-id: gov-1' -H 'x-user-role: government' \
///   -H 'content-type: application/json' \
///   -d '{"target_center_id":"..."}'
/// ```
pub async fn transfer_guest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentActor(actor): CurrentActor,
    Payload(request): Payload<TransferRequest>,
) -> Result<Json<Guest>, AppError> {
    let guest = state
        .services
        .coordinator
        .transfer(&actor, &GuestId::new(id), request)
        .await?;
    Ok(Json(guest))
}

//! HTTP handlers, one module per resource:
//!
//! - [`centers`]: center CRUD, supplies, availability and residents
//! - [`guests`]: admission, listing, updates, discharge, transfer and deletion
//! - [`stats`]: dashboard statistics and activity trends
//!
//! Identity comes from [`CurrentActor`](relief_web::CurrentActor); every
//! service error is turned into the [`AppError`](relief_web::AppError) body.

pub mod centers;
pub mod guests;
pub mod stats;

use axum::extract::Query;
use axum::extract::rejection::QueryRejection;
use relief_core::center::CenterId;
use relief_core::error::ReliefError;
use relief_web::AppError;

/// Center identifier from a path segment. A malformed id names no center.
pub(crate) fn center_id(raw: &str) -> Result<CenterId, ReliefError> {
    CenterId::parse(raw).map_err(|_| ReliefError::center_not_found(raw))
}

/// Unwrap a query string, answering malformed ones with the error body.
pub(crate) fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

//! Custom Axum extractors.
//!
//! - [`CurrentActor`]: the caller identity set by the authentication gateway
//! - [`Payload`]: a JSON body whose rejection uses the [`AppError`] shape
//!
//! # Example
//!
//! ```ignore
//! async fn handler(
//!     CurrentActor(actor): CurrentActor,
//!     Payload(request): Payload<AdmitRequest>,
//! ) -> Result<Json<Guest>, AppError> {
//!     Ok(Json(coordinator.admit(&actor, request).await?))
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Json, Request, rejection::JsonRejection},
    http::{HeaderMap, request::Parts},
};
use relief_core::error::{FieldError, ReliefError};
use relief_core::role::{Actor, Role};
use serde::de::DeserializeOwned;

/// Header carrying the caller's user identifier.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller.
///
/// Rejects with `401 UNAUTHENTICATED` when either header is missing or the
/// role is unknown. Handlers that also serve anonymous callers take
/// `Option<CurrentActor>`.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Reads the caller from request headers.
///
/// # Errors
///
/// Returns [`ReliefError::Unauthenticated`] when a header is missing or the
/// role does not parse.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ReliefError> {
    let user_id = header(headers, USER_ID_HEADER)
        .ok_or_else(|| ReliefError::Unauthenticated(format!("missing {USER_ID_HEADER} header")))?;
    let role = header(headers, USER_ROLE_HEADER)
        .ok_or_else(|| ReliefError::Unauthenticated(format!("missing {USER_ROLE_HEADER} header")))?
        .parse::<Role>()
        .map_err(ReliefError::Unauthenticated)?;
    Ok(Actor::new(user_id, role))
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(actor_from_headers(&parts.headers)?))
    }
}

/// JSON request body.
///
/// Malformed JSON is a `400 BAD_REQUEST`; JSON of the wrong shape (missing
/// field, wrong type) is a `422 VALIDATION_ERROR` naming the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Payload<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(JsonRejection::JsonDataError(err)) => {
                Err(AppError::validation(vec![FieldError::new("body", err.body_text())]))
            }
            Err(rejection) => Err(AppError::bad_request(rejection.body_text())),
        }
    }
}

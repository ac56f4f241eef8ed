//! Error taxonomy for the capacity-consistency engine.
//!
//! Every variant maps to a stable machine-readable [`ReliefError::code`]. Only
//! [`ReliefError::Conflict`] is transient; capacity limits are real-world
//! constraints and are never retried automatically.

use crate::center::CenterId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Convenient result alias.
pub type Result<T, E = ReliefError> = std::result::Result<T, E>;

/// Which kind of record was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A relief center
    Center,
    /// A guest record
    Guest,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Center => "center",
            Self::Guest => "guest",
        })
    }
}

/// A single invalid input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field path, e.g. `location.point.lat`
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldError {
    /// Creates a field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by ledger, registry and coordinator operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReliefError {
    /// Center or guest absent
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What was looked up
        entity: EntityKind,
        /// The identifier that was looked up
        id: String,
    },

    /// Target center has no available capacity
    #[error("center {center_id} is full")]
    CenterFull {
        /// The full center
        center_id: CenterId,
    },

    /// An occupancy adjustment would exceed total capacity
    #[error("center {center_id}: occupancy {occupancy} + {delta} exceeds capacity {capacity}")]
    CapacityExceeded {
        /// The center
        center_id: CenterId,
        /// Occupancy before the adjustment
        occupancy: u32,
        /// Requested change
        delta: i64,
        /// Total capacity
        capacity: u32,
    },

    /// An occupancy adjustment would go below zero
    #[error("center {center_id}: occupancy {occupancy} + {delta} would be negative")]
    NegativeOccupancy {
        /// The center
        center_id: CenterId,
        /// Occupancy before the adjustment
        occupancy: u32,
        /// Requested change
        delta: i64,
    },

    /// Malformed input
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// Concurrent-write contention that outlived the retry budget
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller's role is insufficient
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Caller identity missing
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Transfer target equals the guest's current center
    #[error("guest is already at center {center_id}")]
    SameCenter {
        /// The current center
        center_id: CenterId,
    },

    /// Center still has active guests
    #[error("center {center_id} still has {occupancy} active guests")]
    CenterNotEmpty {
        /// The center
        center_id: CenterId,
        /// Active guests remaining
        occupancy: u32,
    },

    /// Storage backend failure
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ReliefError {
    /// Center not found.
    #[must_use]
    pub fn center_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: EntityKind::Center,
            id: id.to_string(),
        }
    }

    /// Guest not found.
    #[must_use]
    pub fn guest_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: EntityKind::Guest,
            id: id.to_string(),
        }
    }

    /// Validation failure on a single field.
    #[must_use]
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::CenterFull { .. } => "CENTER_FULL",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::NegativeOccupancy { .. } => "NEGATIVE_OCCUPANCY",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::SameCenter { .. } => "SAME_CENTER",
            Self::CenterNotEmpty { .. } => "CENTER_NOT_EMPTY",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
        }
    }

    /// Whether retrying the whole operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Field-level details for validation errors, empty otherwise.
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        match self {
            Self::Validation(fields) => fields,
            _ => &[],
        }
    }
}

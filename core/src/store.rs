//! Persistence abstraction for centers, guests and the activity log.
//!
//! The store holds versioned documents. Reads return a [`Versioned`] snapshot;
//! writes go through [`ShelterStore::commit`], which applies a whole
//! [`Transaction`] or nothing. Each write carries the version it expects to
//! replace, so a concurrent change to any touched document turns the commit
//! into [`StoreError::Conflict`] and the caller reloads and retries.
//!
//! # Implementations
//!
//! - `InMemoryShelterStore` (in `relief-runtime`): per-document locks, no global lock
//! - `PostgresShelterStore` (in `relief-postgres`): version-guarded statements in one SQL transaction
//!
//! # Example
//!
//! ```rust,ignore
//! let loaded = store.load_center(center_id).await?.ok_or(...)?;
//! let mut center = loaded.value.clone();
//! center.current_occupancy += 1;
//!
//! let tx = Transaction::new()
//!     .put_center(center, Expectation::Version(loaded.version))
//!     .put_guest(guest, Expectation::Absent);
//! store.commit(tx).await?;
//! ```

use crate::center::{Center, CenterId};
use crate::error::ReliefError;
use crate::guest::{Guest, GuestId, GuestStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: a document changed since it was read.
    #[error("concurrency conflict on {key}: expected {expected:?}, found {actual:?}")]
    Conflict {
        /// Document key, e.g. `center/<uuid>`
        key: String,
        /// Version the writer expected (`None` = absent)
        expected: Option<u64>,
        /// Version actually present (`None` = absent)
        actual: Option<u64>,
    },

    /// Backend unreachable or failed.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for ReliefError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { key, .. } => Self::Conflict(format!("concurrent update to {key}")),
            StoreError::Unavailable(msg) | StoreError::Serialization(msg) => Self::StorageUnavailable(msg),
        }
    }
}

// ============================================================================
// Documents and transactions
// ============================================================================

/// A document together with the version it was read at.
///
/// Versions start at 1 on insert and increase by one on every write.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// The document
    pub value: T,
    /// Version of the stored document
    pub version: u64,
}

impl<T> Versioned<T> {
    /// Pairs a value with its version.
    pub const fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }

    /// Expectation that matches this snapshot.
    #[must_use]
    pub const fn expect(&self) -> Expectation {
        Expectation::Version(self.version)
    }
}

/// What the writer expects to find in place of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// The document must not exist yet
    Absent,
    /// The document must be at exactly this version
    Version(u64),
}

impl Expectation {
    /// Whether `actual` satisfies this expectation.
    #[must_use]
    pub const fn is_met_by(self, actual: Option<u64>) -> bool {
        match (self, actual) {
            (Self::Absent, None) => true,
            (Self::Version(expected), Some(found)) => expected == found,
            _ => false,
        }
    }

    /// Expected version, `None` for [`Expectation::Absent`].
    #[must_use]
    pub const fn version(self) -> Option<u64> {
        match self {
            Self::Absent => None,
            Self::Version(v) => Some(v),
        }
    }
}

/// Kind of guest lifecycle activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// Guest admitted
    Admission,
    /// Guest discharged
    Discharge,
    /// Guest moved between centers
    Transfer,
    /// Guest record deleted
    Removal,
}

impl ActivityKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admission => "admission",
            Self::Discharge => "discharge",
            Self::Transfer => "transfer",
            Self::Removal => "removal",
        }
    }
}

/// Entry in the append-only activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Identifier
    pub id: Uuid,
    /// What happened
    pub kind: ActivityKind,
    /// Guest involved
    pub guest_id: GuestId,
    /// Center involved (destination for transfers)
    pub center_id: CenterId,
    /// Source center for transfers
    pub from_center_id: Option<CenterId>,
    /// When it was committed
    pub occurred_at: DateTime<Utc>,
}

impl ActivityRecord {
    /// Creates a record with a fresh identifier.
    #[must_use]
    pub fn new(kind: ActivityKind, guest_id: GuestId, center_id: CenterId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            guest_id,
            center_id,
            from_center_id: None,
            occurred_at,
        }
    }

    /// Sets the source center.
    #[must_use]
    pub const fn from_center(mut self, from: CenterId) -> Self {
        self.from_center_id = Some(from);
        self
    }
}

/// One write inside a [`Transaction`].
#[derive(Debug, Clone)]
pub enum Write {
    /// Insert or replace a center
    PutCenter {
        /// New document
        center: Center,
        /// Required current state
        expected: Expectation,
    },
    /// Delete a center
    DeleteCenter {
        /// Center to delete
        id: CenterId,
        /// Required current version
        expected: u64,
    },
    /// Insert or replace a guest
    PutGuest {
        /// New document
        guest: Guest,
        /// Required current state
        expected: Expectation,
    },
    /// Delete a guest
    DeleteGuest {
        /// Guest to delete
        id: GuestId,
        /// Required current version
        expected: u64,
    },
    /// Append to the activity log
    AppendActivity(ActivityRecord),
}

/// An all-or-nothing set of writes.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    writes: Vec<Write>,
}

impl Transaction {
    /// Empty transaction.
    #[must_use]
    pub const fn new() -> Self {
        Self { writes: Vec::new() }
    }

    /// Adds a center write.
    #[must_use]
    pub fn put_center(mut self, center: Center, expected: Expectation) -> Self {
        self.writes.push(Write::PutCenter { center, expected });
        self
    }

    /// Adds a center delete.
    #[must_use]
    pub fn delete_center(mut self, id: CenterId, expected: u64) -> Self {
        self.writes.push(Write::DeleteCenter { id, expected });
        self
    }

    /// Adds a guest write.
    #[must_use]
    pub fn put_guest(mut self, guest: Guest, expected: Expectation) -> Self {
        self.writes.push(Write::PutGuest { guest, expected });
        self
    }

    /// Adds a guest delete.
    #[must_use]
    pub fn delete_guest(mut self, id: GuestId, expected: u64) -> Self {
        self.writes.push(Write::DeleteGuest { id, expected });
        self
    }

    /// Adds an activity record.
    #[must_use]
    pub fn record(mut self, activity: ActivityRecord) -> Self {
        self.writes.push(Write::AppendActivity(activity));
        self
    }

    /// Writes in insertion order.
    #[must_use]
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    /// Consumes the transaction.
    #[must_use]
    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }

    /// Whether there is nothing to commit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Guest listing filter. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestQuery {
    /// Only guests at this center
    pub center_id: Option<CenterId>,
    /// Only guests in this status
    pub status: Option<GuestStatus>,
    /// Case-insensitive substring over name, phone and identifier
    pub text: Option<String>,
}

impl GuestQuery {
    /// Every guest.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Guests at one center.
    #[must_use]
    pub fn at_center(center_id: CenterId) -> Self {
        Self {
            center_id: Some(center_id),
            ..Self::default()
        }
    }

    /// Whether `guest` passes the filter.
    #[must_use]
    pub fn matches(&self, guest: &Guest) -> bool {
        self.center_id.is_none_or(|c| guest.center_id == c)
            && self.status.is_none_or(|s| guest.status == s)
            && self
                .text
                .as_deref()
                .is_none_or(|t| guest.matches(&t.to_lowercase()))
    }
}

// ============================================================================
// Trait
// ============================================================================

/// Durable store for centers, guests and activity.
///
/// # Dyn Compatibility
///
/// Uses explicit boxed futures so services can hold `Arc<dyn ShelterStore>`.
pub trait ShelterStore: Send + Sync {
    /// Load one center.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    fn load_center(&self, id: CenterId) -> StoreFuture<'_, Option<Versioned<Center>>>;

    /// All centers, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    fn list_centers(&self) -> StoreFuture<'_, Vec<Versioned<Center>>>;

    /// Load one guest.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    fn load_guest(&self, id: GuestId) -> StoreFuture<'_, Option<Versioned<Guest>>>;

    /// Guests matching `query`, ordered by creation time then identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    fn find_guests(&self, query: GuestQuery) -> StoreFuture<'_, Vec<Guest>>;

    /// Activity committed at or after `since`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    fn activity_since(&self, since: DateTime<Utc>) -> StoreFuture<'_, Vec<ActivityRecord>>;

    /// Apply every write in `tx`, or none of them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when any expectation is not met; in
    /// that case nothing was written.
    fn commit(&self, tx: Transaction) -> StoreFuture<'_, ()>;
}

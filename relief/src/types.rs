//! Request types accepted by the ledger, registry and coordinator.
//!
//! Every request is validated here, before any store read, so malformed input
//! never reaches a reducer. Numeric fields that clients sometimes send out of
//! range are taken as `i64` and range-checked, which turns a bad capacity into
//! a field error instead of an opaque deserialization failure.

use relief_core::center::{CenterId, CenterStatus, Location, SupplyLevels};
use relief_core::error::{FieldError, ReliefError};
use relief_core::guest::{GuestProfile, GuestProfilePatch, GuestStatus};
use relief_core::role::UserId;
use serde::{Deserialize, Serialize};

/// Longest accepted center name.
pub const MAX_NAME_LEN: usize = 200;

// ============================================================================
// Validation helpers
// ============================================================================

/// Collects field errors and converts them into a single [`ReliefError`].
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldError>);

impl Violations {
    /// No violations yet.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a violation.
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    /// Record a violation when `failed` holds.
    pub fn check(&mut self, failed: bool, field: &str, message: &str) {
        if failed {
            self.push(field, message);
        }
    }

    /// `Ok` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Validation`] with every recorded violation.
    pub fn finish(self) -> Result<(), ReliefError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ReliefError::Validation(self.0))
        }
    }
}

fn check_name(v: &mut Violations, field: &str, name: &str) {
    if name.trim().is_empty() {
        v.push(field, "must not be empty");
    } else if name.len() > MAX_NAME_LEN {
        v.push(field, format!("must be at most {MAX_NAME_LEN} characters"));
    }
}

fn check_capacity(v: &mut Violations, capacity: i64) {
    if capacity < 0 {
        v.push("total_capacity", "must not be negative");
    } else if u32::try_from(capacity).is_err() {
        v.push("total_capacity", "is too large");
    }
}

fn check_location(v: &mut Violations, location: &Location) {
    if location.address.trim().is_empty() {
        v.push("location.address", "must not be empty");
    }
    if !location.point.is_valid() {
        v.push("location.coordinates", "latitude or longitude out of range");
    }
}

fn check_supplies(v: &mut Violations, supplies: &SupplyLevels) {
    for name in supplies.invalid_entries() {
        v.push(&format!("supplies.{name}"), "must be a non-negative number");
    }
}

/// Name presence rules shared by registration and profile edits.
pub fn check_profile_names(v: &mut Violations, first: Option<&str>, last: Option<&str>) {
    if first.is_some_and(|s| s.trim().is_empty()) {
        v.push("first_name", "must not be empty");
    }
    if last.is_some_and(|s| s.trim().is_empty()) {
        v.push("last_name", "must not be empty");
    }
}

/// Capacity as stored, after [`NewCenter::validate`] or [`CenterPatch::validate`].
#[must_use]
pub fn capacity_value(capacity: i64) -> u32 {
    u32::try_from(capacity.max(0)).unwrap_or(u32::MAX)
}

// ============================================================================
// Centers
// ============================================================================

/// A center to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCenter {
    /// Display name
    pub name: String,
    /// Address and coordinates
    pub location: Location,
    /// Guest capacity, zero allowed
    pub total_capacity: i64,
    /// Initial supply levels
    #[serde(default)]
    pub supplies: SupplyLevels,
    /// Managing rescue-center user; defaults to the creator when they are one
    #[serde(default)]
    pub manager_id: Option<UserId>,
}

impl NewCenter {
    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Validation`] listing each bad field.
    pub fn validate(&self) -> Result<(), ReliefError> {
        let mut v = Violations::new();
        check_name(&mut v, "name", &self.name);
        check_location(&mut v, &self.location);
        check_capacity(&mut v, self.total_capacity);
        check_supplies(&mut v, &self.supplies);
        v.finish()
    }
}

/// Partial center update. Occupancy is never client-settable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CenterPatch {
    /// New display name
    #[serde(default)]
    pub name: Option<String>,
    /// New location
    #[serde(default)]
    pub location: Option<Location>,
    /// New capacity; must stay at or above current occupancy
    #[serde(default)]
    pub total_capacity: Option<i64>,
    /// `active` or `inactive`; `full` is derived and cannot be requested
    #[serde(default)]
    pub status: Option<CenterStatus>,
    /// New manager
    #[serde(default)]
    pub manager_id: Option<UserId>,
    /// Supply levels merged into the existing ones
    #[serde(default)]
    pub supplies: Option<SupplyLevels>,
}

impl CenterPatch {
    /// Checks the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Validation`] listing each bad field.
    pub fn validate(&self) -> Result<(), ReliefError> {
        let mut v = Violations::new();
        if let Some(name) = &self.name {
            check_name(&mut v, "name", name);
        }
        if let Some(location) = &self.location {
            check_location(&mut v, location);
        }
        if let Some(capacity) = self.total_capacity {
            check_capacity(&mut v, capacity);
        }
        v.check(
            self.status == Some(CenterStatus::Full),
            "status",
            "full is derived from occupancy and cannot be set",
        );
        if let Some(supplies) = &self.supplies {
            check_supplies(&mut v, supplies);
        }
        v.finish()
    }
}

/// Supply levels to merge into a center's stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyUpdate {
    /// Levels keyed by supply name
    pub supplies: SupplyLevels,
}

impl SupplyUpdate {
    /// Rejects empty updates and negative or non-finite levels.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Validation`] listing each bad entry.
    pub fn validate(&self) -> Result<(), ReliefError> {
        let mut v = Violations::new();
        v.check(self.supplies.is_empty(), "supplies", "must name at least one supply");
        check_supplies(&mut v, &self.supplies);
        v.finish()
    }
}

// ============================================================================
// Guests
// ============================================================================

/// Register a guest at a center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmitRequest {
    /// Target center
    pub center_id: CenterId,
    /// Personal details
    #[serde(flatten)]
    pub profile: GuestProfile,
}

impl AdmitRequest {
    /// Requires both name fields.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Validation`] listing each bad field.
    pub fn validate(&self) -> Result<(), ReliefError> {
        let mut v = Violations::new();
        check_profile_names(
            &mut v,
            Some(&self.profile.first_name),
            Some(&self.profile.last_name),
        );
        v.finish()
    }
}

/// Move a guest to another center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Destination center
    pub target_center_id: CenterId,
}

/// Generic guest update.
///
/// A status change to `discharged` routes through discharge, a different
/// `center_id` routes through transfer, and the remaining fields are plain
/// profile edits applied in the same commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestUpdate {
    /// Requested lifecycle status
    #[serde(default)]
    pub status: Option<GuestStatus>,
    /// Requested center
    #[serde(default)]
    pub center_id: Option<CenterId>,
    /// Profile edits
    #[serde(flatten)]
    pub profile: GuestProfilePatch,
}

impl GuestUpdate {
    /// Rejects blank names, re-activation, and discharge combined with a move.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Validation`] listing each bad field.
    pub fn validate(&self) -> Result<(), ReliefError> {
        let mut v = Violations::new();
        check_profile_names(
            &mut v,
            self.profile.first_name.as_deref(),
            self.profile.last_name.as_deref(),
        );
        v.check(
            self.status == Some(GuestStatus::Discharged) && self.center_id.is_some(),
            "status",
            "cannot discharge and transfer in one update",
        );
        v.finish()
    }

    /// Nothing to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.center_id.is_none() && self.profile.is_empty()
    }
}

/// Optional filters for guest listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestFilter {
    /// Only guests at this center
    #[serde(default)]
    pub center_id: Option<CenterId>,
    /// Only guests with this status
    #[serde(default)]
    pub status: Option<GuestStatus>,
    /// Case-insensitive match on name, phone or id
    #[serde(default, alias = "q")]
    pub search: Option<String>,
}

//! Relief center domain model.
//!
//! A [`Center`] is a shelter with a finite capacity. Its occupancy counter is
//! the only hot shared mutable resource in the system and obeys:
//!
//! - `0 ≤ current_occupancy ≤ total_capacity`
//! - `available_capacity = total_capacity − current_occupancy`
//! - `status == Full` iff `available_capacity == 0`
//!
//! The helpers here compute and check those relations; the center reducer is
//! the only code that mutates a center.

use crate::role::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identity
// ============================================================================

/// Unique identifier for a relief center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CenterId(Uuid);

impl CenterId {
    /// Creates a new random `CenterId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `CenterId` from a UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parses a center identifier from its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns the underlying UUID parse error when `s` is not a UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for CenterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CenterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value types
// ============================================================================

/// Geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude, −90 to 90
    pub lat: f64,
    /// Longitude, −180 to 180
    pub lon: f64,
}

impl GeoPoint {
    /// Whether both coordinates are finite and inside their valid ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Street address plus geographic point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Human-readable address
    pub address: String,
    /// Coordinates
    pub point: GeoPoint,
}

/// Named resource stock levels (water, food, medicine, ...).
///
/// Percentage-style supplies use a 0 to 100 scale; count-style supplies are
/// unbounded. Every level is a finite, non-negative number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplyLevels(BTreeMap<String, f64>);

impl SupplyLevels {
    /// Empty supply snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, level: f64) -> Self {
        self.0.insert(name.into(), level);
        self
    }

    /// Level for a named supply.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Iterate over `(name, level)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of tracked supplies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no supply is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges a partial update: supplies named in `update` are overwritten,
    /// all others are kept.
    pub fn merge(&mut self, update: &Self) {
        for (name, level) in &update.0 {
            self.0.insert(name.clone(), *level);
        }
    }

    /// Supplies whose level is strictly below `threshold`.
    #[must_use]
    pub fn below(&self, threshold: f64) -> Vec<(String, f64)> {
        self.0
            .iter()
            .filter(|(_, level)| **level < threshold)
            .map(|(name, level)| (name.clone(), *level))
            .collect()
    }

    /// Names of supplies whose level is negative or not finite.
    #[must_use]
    pub fn invalid_entries(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, level)| !level.is_finite() || **level < 0.0)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl FromIterator<(String, f64)> for SupplyLevels {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Operational status of a center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CenterStatus {
    /// Accepting guests
    Active,
    /// Administratively closed
    Inactive,
    /// No available capacity
    Full,
}

impl CenterStatus {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for CenterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity snapshot returned by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    /// Active guests counted against capacity
    pub current_occupancy: u32,
    /// Total capacity
    pub total_capacity: u32,
    /// `total_capacity - current_occupancy`
    pub available_capacity: u32,
    /// Occupancy as a percentage, one decimal place
    pub occupancy_percentage: f64,
}

// ============================================================================
// Center
// ============================================================================

/// A relief center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Center {
    /// Identifier
    pub id: CenterId,
    /// Display name
    pub name: String,
    /// Address and coordinates
    pub location: Location,
    /// Total guest capacity
    pub total_capacity: u32,
    /// Active guests counted against capacity
    pub current_occupancy: u32,
    /// Resource stock levels
    #[serde(default)]
    pub supplies: SupplyLevels,
    /// Operational status
    pub status: CenterStatus,
    /// Rescue-center user managing this center, if any
    #[serde(default)]
    pub manager_id: Option<UserId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub last_updated: DateTime<Utc>,
}

impl Center {
    /// Remaining slots.
    #[must_use]
    pub const fn available_capacity(&self) -> u32 {
        self.total_capacity.saturating_sub(self.current_occupancy)
    }

    /// Whether `current_occupancy + delta` stays within `[0, total_capacity]`.
    #[must_use]
    pub fn can_adjust(&self, delta: i64) -> bool {
        let next = i64::from(self.current_occupancy) + delta;
        (0..=i64::from(self.total_capacity)).contains(&next)
    }

    /// Capacity snapshot.
    #[must_use]
    pub fn availability(&self) -> Availability {
        Availability {
            current_occupancy: self.current_occupancy,
            total_capacity: self.total_capacity,
            available_capacity: self.available_capacity(),
            occupancy_percentage: occupancy_rate(
                u64::from(self.current_occupancy),
                u64::from(self.total_capacity),
            ),
        }
    }

    /// Status implied by the current counters.
    ///
    /// A center with no free slot is `Full`. A center that frees a slot goes
    /// back to `Active`. `Inactive` is only ever set by an administrator and
    /// is kept while capacity is available.
    #[must_use]
    pub const fn derived_status(&self) -> CenterStatus {
        if self.available_capacity() == 0 {
            CenterStatus::Full
        } else {
            match self.status {
                CenterStatus::Inactive => CenterStatus::Inactive,
                CenterStatus::Active | CenterStatus::Full => CenterStatus::Active,
            }
        }
    }

    /// Whether the capacity invariants hold.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.current_occupancy <= self.total_capacity
            && ((self.status == CenterStatus::Full) == (self.available_capacity() == 0))
    }

    /// Whether `user` manages this center.
    #[must_use]
    pub fn is_managed_by(&self, user: &UserId) -> bool {
        self.manager_id.as_ref() == Some(user)
    }
}

/// Percentage `part / whole`, rounded to one decimal. Zero when `whole` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)] // counts stay far below 2^52
pub fn occupancy_rate(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(part as f64 / whole as f64 * 100.0)
}

/// Rounds to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

//! Fixture builders for centers and guests.

use crate::mocks::test_time;
use relief_core::center::{Center, CenterId, CenterStatus, GeoPoint, Location, SupplyLevels};
use relief_core::guest::{Guest, GuestId, GuestProfile, GuestStatus};
use relief_core::role::UserId;

/// Builder for [`Center`] fixtures.
///
/// Status is derived from the counters unless set explicitly with
/// [`inactive`](Self::inactive).
///
/// ```
/// use relief_testing::fixtures::CenterBuilder;
///
/// let center = CenterBuilder::new("Riverside").capacity(1).occupancy(1).build();
/// assert_eq!(center.status.as_str(), "full");
/// ```
#[derive(Debug, Clone)]
pub struct CenterBuilder {
    center: Center,
    inactive: bool,
}

impl CenterBuilder {
    /// Active center with capacity 10, nobody admitted, timestamps at [`test_time`].
    #[must_use]
    pub fn new(name: &str) -> Self {
        let now = test_time();
        Self {
            center: Center {
                id: CenterId::new(),
                name: name.to_string(),
                location: Location {
                    address: format!("{name} Street 1"),
                    point: GeoPoint { lat: 0.0, lon: 0.0 },
                },
                total_capacity: 10,
                current_occupancy: 0,
                supplies: SupplyLevels::new(),
                status: CenterStatus::Active,
                manager_id: None,
                created_at: now,
                last_updated: now,
            },
            inactive: false,
        }
    }

    /// Use a specific identifier.
    #[must_use]
    pub const fn id(mut self, id: CenterId) -> Self {
        self.center.id = id;
        self
    }

    /// Total capacity.
    #[must_use]
    pub const fn capacity(mut self, capacity: u32) -> Self {
        self.center.total_capacity = capacity;
        self
    }

    /// Current occupancy.
    #[must_use]
    pub const fn occupancy(mut self, occupancy: u32) -> Self {
        self.center.current_occupancy = occupancy;
        self
    }

    /// Add a supply level.
    #[must_use]
    pub fn supply(mut self, name: &str, level: f64) -> Self {
        self.center.supplies = self.center.supplies.with(name, level);
        self
    }

    /// Managing rescue-center user.
    #[must_use]
    pub fn managed_by(mut self, user: &str) -> Self {
        self.center.manager_id = Some(UserId::new(user));
        self
    }

    /// Administratively closed.
    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.inactive = true;
        self
    }

    /// Last-updated timestamp.
    #[must_use]
    pub const fn last_updated(mut self, at: chrono::DateTime<chrono::Utc>) -> Self {
        self.center.last_updated = at;
        self
    }

    /// Finish the fixture.
    #[must_use]
    pub fn build(mut self) -> Center {
        if self.inactive {
            self.center.status = CenterStatus::Inactive;
        }
        self.center.status = self.center.derived_status();
        self.center
    }
}

/// Active guest fixture at `center_id`.
#[must_use]
pub fn guest(id: &str, center_id: CenterId) -> Guest {
    let now = test_time();
    Guest {
        id: GuestId::new(id),
        center_id,
        profile: GuestProfile::named("Guest", id),
        status: GuestStatus::Active,
        transfer_history: Vec::new(),
        created_at: now,
        updated_at: now,
        discharged_at: None,
    }
}

/// Discharged guest fixture at `center_id`.
#[must_use]
pub fn discharged_guest(id: &str, center_id: CenterId) -> Guest {
    Guest {
        status: GuestStatus::Discharged,
        discharged_at: Some(test_time()),
        ..guest(id, center_id)
    }
}

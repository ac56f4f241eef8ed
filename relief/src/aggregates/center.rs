//! Center aggregate.
//!
//! Owns the capacity invariant of a single center: occupancy stays within
//! `0..=total_capacity` and status follows the counters. The reducer works on
//! a copy of the stored document; the ledger or the coordinator commits the
//! result together with whatever else the operation touches.

use crate::types::{CenterPatch, NewCenter, capacity_value};
use relief_core::center::{Center, CenterId, CenterStatus, SupplyLevels};
use relief_core::environment::Clock;
use relief_core::error::ReliefError;
use relief_core::event::{Events, ShelterEvent};
use relief_core::reducer::Reducer;
use relief_core::role::UserId;
use relief_core::smallvec;
use std::sync::Arc;

// ============================================================================
// Actions
// ============================================================================

/// Commands accepted by [`CenterReducer`].
#[derive(Clone, Debug)]
pub enum CenterAction {
    /// Create the center; state must be empty
    Create {
        /// Identifier to assign
        id: CenterId,
        /// Validated draft
        draft: NewCenter,
        /// Manager when the draft names none
        default_manager: Option<UserId>,
    },
    /// Apply a partial update
    Update(CenterPatch),
    /// Merge supply levels
    UpdateSupplies(SupplyLevels),
    /// Change occupancy by `delta`
    AdjustOccupancy {
        /// Signed change, usually ±1
        delta: i64,
    },
    /// Remove the center; occupancy must be zero
    Delete,
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of [`CenterReducer`].
#[derive(Clone)]
pub struct CenterEnvironment {
    /// Stamps `created_at` and `last_updated`
    pub clock: Arc<dyn Clock>,
}

impl CenterEnvironment {
    /// Creates a new `CenterEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for a single center document.
#[derive(Clone, Debug, Default)]
pub struct CenterReducer;

impl CenterReducer {
    /// Creates a new `CenterReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn existing<'a>(state: &'a mut Option<Center>, what: &str) -> Result<&'a mut Center, ReliefError> {
        state
            .as_mut()
            .ok_or_else(|| ReliefError::Conflict(format!("cannot {what}: center does not exist")))
    }

    fn validate_adjustment(center: &Center, delta: i64) -> Result<(), ReliefError> {
        let next = i64::from(center.current_occupancy) + delta;
        if next < 0 {
            return Err(ReliefError::NegativeOccupancy {
                center_id: center.id,
                occupancy: center.current_occupancy,
                delta,
            });
        }
        if next > i64::from(center.total_capacity) {
            return Err(ReliefError::CapacityExceeded {
                center_id: center.id,
                occupancy: center.current_occupancy,
                delta,
                capacity: center.total_capacity,
            });
        }
        Ok(())
    }

    fn validate_update(center: &Center, patch: &CenterPatch) -> Result<(), ReliefError> {
        patch.validate()?;

        let capacity = patch
            .total_capacity
            .map_or(center.total_capacity, capacity_value);
        if capacity < center.current_occupancy {
            return Err(ReliefError::invalid(
                "total_capacity",
                format!(
                    "cannot be below current occupancy ({})",
                    center.current_occupancy
                ),
            ));
        }
        if patch.status.is_some() && capacity == center.current_occupancy {
            return Err(ReliefError::invalid(
                "status",
                "cannot be changed while the center is full",
            ));
        }
        Ok(())
    }

    /// Status after a counter change, keeping an explicit `inactive`.
    fn restatus(center: &mut Center, requested: Option<CenterStatus>) {
        if let Some(status) = requested {
            center.status = status;
        }
        center.status = match center.derived_status() {
            CenterStatus::Full => CenterStatus::Full,
            _ if center.status == CenterStatus::Inactive => CenterStatus::Inactive,
            _ => CenterStatus::Active,
        };
    }

    fn updated(center: &Center) -> Events {
        smallvec![ShelterEvent::CenterUpdated(Box::new(center.clone()))]
    }
}

impl Reducer for CenterReducer {
    type State = Option<Center>;
    type Action = CenterAction;
    type Environment = CenterEnvironment;

    fn reduce(
        &self,
        state: &mut Option<Center>,
        action: CenterAction,
        env: &CenterEnvironment,
    ) -> Result<Events, ReliefError> {
        let now = env.clock.now();

        match action {
            CenterAction::Create {
                id,
                draft,
                default_manager,
            } => {
                if state.is_some() {
                    return Err(ReliefError::Conflict(format!("center {id} already exists")));
                }
                draft.validate()?;

                let mut center = Center {
                    id,
                    name: draft.name.trim().to_string(),
                    location: draft.location,
                    total_capacity: capacity_value(draft.total_capacity),
                    current_occupancy: 0,
                    supplies: draft.supplies,
                    status: CenterStatus::Active,
                    manager_id: draft.manager_id.or(default_manager),
                    created_at: now,
                    last_updated: now,
                };
                Self::restatus(&mut center, None);

                let events = Self::updated(&center);
                *state = Some(center);
                Ok(events)
            }

            CenterAction::Update(patch) => {
                let center = Self::existing(state, "update")?;
                Self::validate_update(center, &patch)?;

                if let Some(name) = patch.name {
                    center.name = name.trim().to_string();
                }
                if let Some(location) = patch.location {
                    center.location = location;
                }
                if let Some(capacity) = patch.total_capacity {
                    center.total_capacity = capacity_value(capacity);
                }
                if let Some(manager) = patch.manager_id {
                    center.manager_id = Some(manager);
                }
                if let Some(supplies) = &patch.supplies {
                    center.supplies.merge(supplies);
                }
                Self::restatus(center, patch.status);
                center.last_updated = now;

                Ok(Self::updated(center))
            }

            CenterAction::UpdateSupplies(supplies) => {
                let center = Self::existing(state, "update supplies")?;
                let invalid = supplies.invalid_entries();
                if let Some(name) = invalid.first() {
                    return Err(ReliefError::invalid(
                        format!("supplies.{name}"),
                        "must be a non-negative number",
                    ));
                }
                center.supplies.merge(&supplies);
                center.last_updated = now;
                Ok(Self::updated(center))
            }

            CenterAction::AdjustOccupancy { delta } => {
                let center = Self::existing(state, "adjust occupancy")?;
                Self::validate_adjustment(center, delta)?;

                let next = i64::from(center.current_occupancy) + delta;
                center.current_occupancy = u32::try_from(next).unwrap_or(center.total_capacity);
                Self::restatus(center, None);
                center.last_updated = now;

                Ok(Self::updated(center))
            }

            CenterAction::Delete => {
                let center = Self::existing(state, "delete")?;
                if center.current_occupancy > 0 {
                    return Err(ReliefError::CenterNotEmpty {
                        center_id: center.id,
                        occupancy: center.current_occupancy,
                    });
                }
                let center_id = center.id;
                *state = None;
                Ok(smallvec![ShelterEvent::CenterDeleted { center_id }])
            }
        }
    }
}

//! Guest aggregate.
//!
//! Lifecycle of one guest record: registration, profile edits, discharge,
//! relocation between centers and removal. Capacity is not this reducer's
//! concern; the coordinator pairs each capacity-affecting transition with the
//! matching center adjustment.

use crate::types::{Violations, check_profile_names};
use relief_core::center::CenterId;
use relief_core::environment::Clock;
use relief_core::error::ReliefError;
use relief_core::event::{Events, ShelterEvent};
use relief_core::guest::{Guest, GuestId, GuestProfile, GuestProfilePatch, GuestStatus, TransferRecord};
use relief_core::reducer::Reducer;
use relief_core::{SmallVec, smallvec};
use std::sync::Arc;

// ============================================================================
// Actions
// ============================================================================

/// Commands accepted by [`GuestReducer`].
#[derive(Clone, Debug)]
pub enum GuestAction {
    /// Create the record; state must be empty
    Register {
        /// Identifier to assign
        id: GuestId,
        /// Owning center
        center_id: CenterId,
        /// Personal details
        profile: GuestProfile,
    },
    /// Edit profile fields
    Amend(GuestProfilePatch),
    /// Mark discharged; a no-op when already discharged
    Discharge,
    /// Move to another center and append to the transfer history
    Relocate {
        /// Destination center
        to: CenterId,
    },
    /// Delete the record
    Remove,
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of [`GuestReducer`].
#[derive(Clone)]
pub struct GuestEnvironment {
    /// Stamps creation, update, discharge and transfer times
    pub clock: Arc<dyn Clock>,
}

impl GuestEnvironment {
    /// Creates a new `GuestEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for a single guest record.
#[derive(Clone, Debug, Default)]
pub struct GuestReducer;

impl GuestReducer {
    /// Creates a new `GuestReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn existing(state: &mut Option<Guest>) -> Result<&mut Guest, ReliefError> {
        state
            .as_mut()
            .ok_or_else(|| ReliefError::Conflict("guest does not exist".to_string()))
    }

    fn validate_registration(profile: &GuestProfile) -> Result<(), ReliefError> {
        let mut v = Violations::new();
        check_profile_names(&mut v, Some(&profile.first_name), Some(&profile.last_name));
        v.finish()
    }

    fn validate_amend(patch: &GuestProfilePatch) -> Result<(), ReliefError> {
        let mut v = Violations::new();
        check_profile_names(&mut v, patch.first_name.as_deref(), patch.last_name.as_deref());
        v.finish()
    }

    fn validate_relocation(guest: &Guest, to: CenterId) -> Result<(), ReliefError> {
        if guest.center_id == to {
            return Err(ReliefError::SameCenter { center_id: to });
        }
        if !guest.is_active() {
            return Err(ReliefError::invalid(
                "status",
                "discharged guests cannot be transferred",
            ));
        }
        Ok(())
    }

    fn updated(guest: &Guest) -> Events {
        smallvec![ShelterEvent::GuestUpdated(Box::new(guest.clone()))]
    }
}

impl Reducer for GuestReducer {
    type State = Option<Guest>;
    type Action = GuestAction;
    type Environment = GuestEnvironment;

    fn reduce(
        &self,
        state: &mut Option<Guest>,
        action: GuestAction,
        env: &GuestEnvironment,
    ) -> Result<Events, ReliefError> {
        let now = env.clock.now();

        match action {
            GuestAction::Register {
                id,
                center_id,
                profile,
            } => {
                if state.is_some() {
                    return Err(ReliefError::Conflict(format!("guest {id} already exists")));
                }
                Self::validate_registration(&profile)?;

                let guest = Guest {
                    id,
                    center_id,
                    profile,
                    status: GuestStatus::Active,
                    transfer_history: Vec::new(),
                    created_at: now,
                    updated_at: now,
                    discharged_at: None,
                };
                let events = smallvec![ShelterEvent::GuestCreated(Box::new(guest.clone()))];
                *state = Some(guest);
                Ok(events)
            }

            GuestAction::Amend(patch) => {
                let guest = Self::existing(state)?;
                Self::validate_amend(&patch)?;
                if patch.is_empty() {
                    return Ok(SmallVec::new());
                }
                patch.apply_to(&mut guest.profile);
                guest.updated_at = now;
                Ok(Self::updated(guest))
            }

            GuestAction::Discharge => {
                let guest = Self::existing(state)?;
                if !guest.is_active() {
                    return Ok(SmallVec::new());
                }
                guest.status = GuestStatus::Discharged;
                guest.discharged_at = Some(now);
                guest.updated_at = now;
                Ok(Self::updated(guest))
            }

            GuestAction::Relocate { to } => {
                let guest = Self::existing(state)?;
                Self::validate_relocation(guest, to)?;
                guest.transfer_history.push(TransferRecord {
                    from_center_id: guest.center_id,
                    to_center_id: to,
                    transferred_at: now,
                });
                guest.center_id = to;
                guest.updated_at = now;
                Ok(Self::updated(guest))
            }

            GuestAction::Remove => {
                let guest = Self::existing(state)?;
                let event = ShelterEvent::GuestDeleted {
                    guest_id: guest.id.clone(),
                    center_id: guest.center_id,
                };
                *state = None;
                Ok(smallvec![event])
            }
        }
    }
}

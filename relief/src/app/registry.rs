//! Guest Registry: guest records, independent of capacity bookkeeping.
//!
//! The registry persists profile edits on its own. Registration, discharge,
//! relocation and removal change a center's occupancy as well, so for those
//! it only stages the new record; the coordinator commits it together with
//! the matching center adjustment.

use super::Context;
use crate::aggregates::{GuestAction, GuestEnvironment, GuestReducer};
use crate::types::GuestFilter;
use relief_core::center::CenterId;
use relief_core::error::ReliefError;
use relief_core::event::Events;
use relief_core::guest::{Guest, GuestId, GuestProfile, GuestProfilePatch};
use relief_core::reducer::Reducer;
use relief_core::store::{GuestQuery, Transaction, Versioned};

/// Guest records.
pub struct GuestRegistry {
    ctx: Context,
    reducer: GuestReducer,
    env: GuestEnvironment,
}

impl GuestRegistry {
    /// Creates a new `GuestRegistry`
    #[must_use]
    pub fn new(ctx: Context) -> Self {
        let env = GuestEnvironment::new(ctx.clock.clone());
        Self {
            ctx,
            reducer: GuestReducer::new(),
            env,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub(crate) async fn load(&self, id: &GuestId) -> Result<Versioned<Guest>, ReliefError> {
        self.ctx
            .store
            .load_guest(id.clone())
            .await?
            .ok_or_else(|| ReliefError::guest_not_found(id))
    }

    /// One guest.
    ///
    /// # Errors
    ///
    /// [`ReliefError::NotFound`] when absent.
    pub async fn find_by_id(&self, id: &GuestId) -> Result<Guest, ReliefError> {
        Ok(self.load(id).await?.value)
    }

    /// Every guest affiliated with `center_id`, discharged ones included.
    ///
    /// # Errors
    ///
    /// [`ReliefError::StorageUnavailable`] when the store fails.
    pub async fn find_by_center(&self, center_id: CenterId) -> Result<Vec<Guest>, ReliefError> {
        Ok(self.ctx.store.find_guests(GuestQuery::at_center(center_id)).await?)
    }

    /// Case-insensitive substring search over names, phone and identifier.
    ///
    /// # Errors
    ///
    /// [`ReliefError::StorageUnavailable`] when the store fails.
    pub async fn search(&self, text: &str) -> Result<Vec<Guest>, ReliefError> {
        self.list(GuestFilter {
            search: Some(text.to_string()),
            ..GuestFilter::default()
        })
        .await
    }

    /// Guests matching every filter that is set.
    ///
    /// # Errors
    ///
    /// [`ReliefError::StorageUnavailable`] when the store fails.
    pub async fn list(&self, filter: GuestFilter) -> Result<Vec<Guest>, ReliefError> {
        let query = GuestQuery {
            center_id: filter.center_id,
            status: filter.status,
            text: filter
                .search
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
        };
        Ok(self.ctx.store.find_guests(query).await?)
    }

    // ========================================================================
    // Staging (used by the coordinator)
    // ========================================================================

    /// A new active guest at `center_id` with a fresh identifier.
    pub(crate) fn stage_create(
        &self,
        center_id: CenterId,
        profile: GuestProfile,
    ) -> Result<(Guest, Events), ReliefError> {
        let id = self.ctx.ids.next_guest_id(self.ctx.clock.now());
        let mut state = None;
        let events = self.reducer.reduce(
            &mut state,
            GuestAction::Register {
                id: id.clone(),
                center_id,
                profile,
            },
            &self.env,
        )?;
        let guest = state.ok_or_else(|| ReliefError::guest_not_found(&id))?;
        Ok((guest, events))
    }

    /// `action` applied to a copy of `guest`. Not for [`GuestAction::Remove`].
    pub(crate) fn stage(
        &self,
        guest: &Guest,
        action: GuestAction,
    ) -> Result<(Guest, Events), ReliefError> {
        let mut state = Some(guest.clone());
        let events = self.reducer.reduce(&mut state, action, &self.env)?;
        let next = state.ok_or_else(|| ReliefError::guest_not_found(&guest.id))?;
        Ok((next, events))
    }

    /// Events of removing `guest`.
    pub(crate) fn stage_remove(&self, guest: &Guest) -> Result<Events, ReliefError> {
        let mut state = Some(guest.clone());
        self.reducer.reduce(&mut state, GuestAction::Remove, &self.env)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Persist a profile edit. Status and center are not touched here.
    ///
    /// Callers authorize first; [`AdmissionCoordinator::update_guest`] does.
    ///
    /// [`AdmissionCoordinator::update_guest`]: super::AdmissionCoordinator::update_guest
    ///
    /// # Errors
    ///
    /// - [`ReliefError::NotFound`] when absent
    /// - [`ReliefError::Validation`] for blank names
    /// - [`ReliefError::Conflict`] when the retry budget is exhausted
    pub async fn update(&self, id: &GuestId, patch: GuestProfilePatch) -> Result<Guest, ReliefError> {
        let patch = &patch;
        self.ctx
            .retrying("update_guest", || async move {
                let current = self.load(id).await?;
                let (guest, events) = self.stage(&current.value, GuestAction::Amend(patch.clone()))?;
                if events.is_empty() {
                    return Ok(guest);
                }
                let tx = Transaction::new().put_guest(guest.clone(), current.expect());
                self.ctx.commit("update_guest", tx).await?;
                self.ctx.publish(events).await;
                Ok(guest)
            })
            .await
    }
}

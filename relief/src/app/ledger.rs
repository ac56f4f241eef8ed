//! Center Ledger: single source of truth for a center's capacity state.

use super::Context;
use crate::aggregates::{CenterAction, CenterEnvironment, CenterReducer};
use crate::metrics::update_center_occupancy;
use crate::types::{CenterPatch, NewCenter, SupplyUpdate};
use chrono::{DateTime, Utc};
use relief_core::center::{Availability, Center, CenterId, CenterStatus};
use relief_core::error::ReliefError;
use relief_core::event::{Events, Notification, ShelterEvent};
use relief_core::reducer::Reducer;
use relief_core::role::{Actor, Permission, Role};
use relief_core::store::{Expectation, Transaction, Versioned};

/// Capacity notification for the manager of a center that just became full.
#[must_use]
pub fn capacity_alert(before: &Center, after: &Center, at: DateTime<Utc>) -> Option<ShelterEvent> {
    let filled = before.status != CenterStatus::Full && after.status == CenterStatus::Full;
    let manager = after.manager_id.clone().filter(|_| filled)?;
    crate::metrics::record_capacity_alert();
    Some(ShelterEvent::Notification(Box::new(Notification::center_full(
        manager, after, at,
    ))))
}

/// Center documents and their occupancy counters.
///
/// Reads are open to every caller. Mutations are authorized against the
/// caller's role and, for rescue-center callers, the center's manager.
pub struct CenterLedger {
    ctx: Context,
    reducer: CenterReducer,
    env: CenterEnvironment,
}

impl CenterLedger {
    /// Creates a new `CenterLedger`
    #[must_use]
    pub fn new(ctx: Context) -> Self {
        let env = CenterEnvironment::new(ctx.clock.clone());
        Self {
            ctx,
            reducer: CenterReducer::new(),
            env,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub(crate) async fn load(&self, id: CenterId) -> Result<Versioned<Center>, ReliefError> {
        self.ctx
            .store
            .load_center(id)
            .await?
            .ok_or_else(|| ReliefError::center_not_found(id))
    }

    pub(crate) async fn load_optional(
        &self,
        id: CenterId,
    ) -> Result<Option<Versioned<Center>>, ReliefError> {
        Ok(self.ctx.store.load_center(id).await?)
    }

    /// One center.
    ///
    /// # Errors
    ///
    /// [`ReliefError::NotFound`] when absent.
    pub async fn get_center(&self, id: CenterId) -> Result<Center, ReliefError> {
        Ok(self.load(id).await?.value)
    }

    /// Every center, ordered by name.
    ///
    /// # Errors
    ///
    /// [`ReliefError::StorageUnavailable`] when the store fails.
    pub async fn list_centers(&self) -> Result<Vec<Center>, ReliefError> {
        let centers = self.ctx.store.list_centers().await?;
        Ok(centers.into_iter().map(|c| c.value).collect())
    }

    /// Occupancy, capacity and the derived figures for one center.
    ///
    /// # Errors
    ///
    /// [`ReliefError::NotFound`] when absent.
    pub async fn get_availability(&self, id: CenterId) -> Result<Availability, ReliefError> {
        Ok(self.load(id).await?.value.availability())
    }

    /// Whether `current_occupancy + delta` stays within `[0, total_capacity]`.
    ///
    /// A point-in-time answer; [`adjust_occupancy`](Self::adjust_occupancy)
    /// re-checks at commit.
    ///
    /// # Errors
    ///
    /// [`ReliefError::NotFound`] when absent.
    pub async fn validate_capacity(&self, id: CenterId, delta: i64) -> Result<bool, ReliefError> {
        Ok(self.load(id).await?.value.can_adjust(delta))
    }

    // ========================================================================
    // Staging (used by the coordinator)
    // ========================================================================

    /// Occupancy change applied to a copy of `center`.
    pub(crate) fn stage_adjustment(
        &self,
        center: &Center,
        delta: i64,
    ) -> Result<(Center, Events), ReliefError> {
        let mut state = Some(center.clone());
        let events = self
            .reducer
            .reduce(&mut state, CenterAction::AdjustOccupancy { delta }, &self.env)?;
        let next = state.ok_or_else(|| ReliefError::center_not_found(center.id))?;
        Ok((next, events))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Change occupancy by `delta`, re-validated against the stored value.
    ///
    /// Lost races are retried with a fresh read, so two callers competing for
    /// the last slot cannot both win.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::NotFound`] when absent
    /// - [`ReliefError::CapacityExceeded`] / [`ReliefError::NegativeOccupancy`] when out of range
    /// - [`ReliefError::Conflict`] when the retry budget is exhausted
    pub async fn adjust_occupancy(
        &self,
        id: CenterId,
        delta: i64,
    ) -> Result<Availability, ReliefError> {
        let center = self
            .ctx
            .retrying("adjust_occupancy", || async move {
                let current = self.load(id).await?;
                let (next, mut events) = self.stage_adjustment(&current.value, delta)?;
                let tx = Transaction::new().put_center(next.clone(), current.expect());
                self.ctx.commit("adjust_occupancy", tx).await?;
                events.extend(capacity_alert(&current.value, &next, self.ctx.clock.now()));
                self.ctx.publish(events).await;
                Ok(next)
            })
            .await
            .inspect_err(|err| log_rejection(id, err))?;

        update_center_occupancy(&center);
        Ok(center.availability())
    }

    /// Create a center. A rescue-center caller becomes its manager unless
    /// the draft names one.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::Forbidden`] for citizens
    /// - [`ReliefError::Validation`] for a malformed draft
    #[tracing::instrument(skip(self, draft), fields(user = %actor.user_id))]
    pub async fn create_center(&self, actor: &Actor, draft: NewCenter) -> Result<Center, ReliefError> {
        actor.authorize(Permission::CreateCenter, None)?;
        draft.validate()?;

        let default_manager = (actor.role == Role::RescueCenter).then(|| actor.user_id.clone());
        let id = self.ctx.ids.next_center_id();
        let mut state = None;
        let events = self.reducer.reduce(
            &mut state,
            CenterAction::Create {
                id,
                draft,
                default_manager,
            },
            &self.env,
        )?;
        let center = state.ok_or_else(|| ReliefError::center_not_found(id))?;

        let tx = Transaction::new().put_center(center.clone(), Expectation::Absent);
        self.ctx.commit("create_center", tx).await?;
        self.ctx.publish(events).await;

        tracing::info!(center_id = %center.id, capacity = center.total_capacity, "center created");
        Ok(center)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::NotFound`] when absent
    /// - [`ReliefError::Forbidden`] when the caller may not manage the center
    /// - [`ReliefError::Validation`] for a malformed patch or a capacity below occupancy
    pub async fn update_center(
        &self,
        actor: &Actor,
        id: CenterId,
        patch: CenterPatch,
    ) -> Result<Center, ReliefError> {
        patch.validate()?;
        self.mutate(actor, id, "update_center", || CenterAction::Update(patch.clone()))
            .await
    }

    /// Merge supply levels into the center's stock.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::NotFound`] when absent
    /// - [`ReliefError::Forbidden`] when the caller may not manage the center
    /// - [`ReliefError::Validation`] for negative or non-finite levels
    pub async fn update_supplies(
        &self,
        actor: &Actor,
        id: CenterId,
        update: SupplyUpdate,
    ) -> Result<Center, ReliefError> {
        update.validate()?;
        self.mutate(actor, id, "update_supplies", || {
            CenterAction::UpdateSupplies(update.supplies.clone())
        })
        .await
    }

    /// Delete a center with no active guests.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::NotFound`] when absent
    /// - [`ReliefError::Forbidden`] when the caller may not manage the center
    /// - [`ReliefError::CenterNotEmpty`] while occupancy is above zero
    pub async fn delete_center(&self, actor: &Actor, id: CenterId) -> Result<(), ReliefError> {
        self.ctx
            .retrying("delete_center", || async move {
                let current = self.load(id).await?;
                actor.authorize(Permission::ManageCenter, Some(&current.value))?;

                let mut state = Some(current.value.clone());
                let events = self.reducer.reduce(&mut state, CenterAction::Delete, &self.env)?;

                let tx = Transaction::new().delete_center(id, current.version);
                self.ctx.commit("delete_center", tx).await?;
                self.ctx.publish(events).await;
                Ok(())
            })
            .await?;

        tracing::info!(center_id = %id, "center deleted");
        Ok(())
    }

    /// Load, authorize, reduce and commit one center, retrying lost races.
    async fn mutate<F>(
        &self,
        actor: &Actor,
        id: CenterId,
        operation: &'static str,
        action: F,
    ) -> Result<Center, ReliefError>
    where
        F: Fn() -> CenterAction,
    {
        let action = &action;
        self.ctx
            .retrying(operation, || async move {
                let current = self.load(id).await?;
                actor.authorize(Permission::ManageCenter, Some(&current.value))?;

                let mut state = Some(current.value.clone());
                let events = self.reducer.reduce(&mut state, action(), &self.env)?;
                let center = state.ok_or_else(|| ReliefError::center_not_found(id))?;

                let tx = Transaction::new().put_center(center.clone(), current.expect());
                self.ctx.commit(operation, tx).await?;
                self.ctx.publish(events).await;
                Ok(center)
            })
            .await
    }
}

/// Capacity rejections are routine; an occupancy underflow is a bug.
pub(crate) fn log_rejection(center_id: CenterId, err: &ReliefError) {
    match err {
        ReliefError::NegativeOccupancy { .. } => {
            tracing::error!(%center_id, error = %err, "occupancy would go negative");
        }
        ReliefError::CenterFull { .. }
        | ReliefError::CapacityExceeded { .. }
        | ReliefError::NotFound { .. } => {
            tracing::info!(%center_id, error = %err, "capacity change rejected");
        }
        ReliefError::Conflict(_) => {
            tracing::warn!(%center_id, error = %err, "capacity change lost every retry");
        }
        _ => tracing::debug!(%center_id, error = %err, "capacity change failed"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use relief_core::center::{GeoPoint, Location, SupplyLevels};
    use relief_core::event_bus::EventBus;
    use relief_core::store::ShelterStore;
    use relief_runtime::{InMemoryShelterStore, RetryPolicy};
    use relief_testing::faults::RecordingEventBus;
    use relief_testing::fixtures::CenterBuilder;
    use relief_testing::{SequentialIdGenerator, test_clock};
    use std::sync::Arc;

    async fn ledger_with(centers: &[Center]) -> (CenterLedger, Arc<RecordingEventBus>) {
        let store = Arc::new(InMemoryShelterStore::new());
        for center in centers {
            store
                .commit(Transaction::new().put_center(center.clone(), Expectation::Absent))
                .await
                .unwrap();
        }
        let bus = Arc::new(RecordingEventBus::new());
        let ctx = Context::new(
            store,
            Arc::clone(&bus) as Arc<dyn EventBus>,
            Arc::new(test_clock()),
            Arc::new(SequentialIdGenerator::new()),
            RetryPolicy::default(),
        );
        (CenterLedger::new(ctx), bus)
    }

    fn admin() -> Actor {
        Actor::new("admin-1", Role::Admin)
    }

    fn draft() -> NewCenter {
        NewCenter {
            name: "Hall".into(),
            location: Location {
                address: "2 Hill Rd".into(),
                point: GeoPoint { lat: 1.0, lon: 2.0 },
            },
            total_capacity: 3,
            supplies: SupplyLevels::new(),
            manager_id: None,
        }
    }

    #[tokio::test]
    async fn test_availability() {
        let center = CenterBuilder::new("A").capacity(10).occupancy(5).build();
        let (ledger, _) = ledger_with(&[center.clone()]).await;

        let availability = ledger.get_availability(center.id).await.unwrap();
        assert_eq!(availability.available_capacity, 5);
        assert!((availability.occupancy_percentage - 50.0).abs() < f64::EPSILON);

        assert!(ledger.validate_capacity(center.id, 5).await.unwrap());
        assert!(!ledger.validate_capacity(center.id, 6).await.unwrap());
        assert!(!ledger.validate_capacity(center.id, -6).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_center_is_not_found() {
        let (ledger, _) = ledger_with(&[]).await;
        let err = ledger.get_availability(CenterId::new()).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_adjust_occupancy_to_full_alerts_manager() {
        let center = CenterBuilder::new("A").capacity(1).managed_by("rc-1").build();
        let (ledger, bus) = ledger_with(&[center.clone()]).await;

        let availability = ledger.adjust_occupancy(center.id, 1).await.unwrap();
        assert_eq!(availability.available_capacity, 0);
        assert_eq!(bus.names(), ["center:updated", "notification"]);

        let err = ledger.adjust_occupancy(center.id, 1).await.unwrap_err();
        assert_eq!(err.code(), "CAPACITY_EXCEEDED");
        assert_eq!(ledger.get_center(center.id).await.unwrap().current_occupancy, 1);
    }

    #[tokio::test]
    async fn test_rescue_center_creator_becomes_manager() {
        let (ledger, _) = ledger_with(&[]).await;
        let actor = Actor::new("rc-7", Role::RescueCenter);

        let center = ledger.create_center(&actor, draft()).await.unwrap();
        assert!(center.is_managed_by(&actor.user_id));

        let other = Actor::new("rc-8", Role::RescueCenter);
        let err = ledger
            .update_center(&other, center.id, CenterPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_citizen_cannot_create() {
        let (ledger, _) = ledger_with(&[]).await;
        let err = ledger
            .create_center(&Actor::new("c-1", Role::Citizen), draft())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
        assert!(ledger.list_centers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_only_when_empty() {
        let busy = CenterBuilder::new("Busy").occupancy(2).build();
        let empty = CenterBuilder::new("Empty").build();
        let (ledger, bus) = ledger_with(&[busy.clone(), empty.clone()]).await;

        let err = ledger.delete_center(&admin(), busy.id).await.unwrap_err();
        assert_eq!(err.code(), "CENTER_NOT_EMPTY");

        ledger.delete_center(&admin(), empty.id).await.unwrap();
        assert_eq!(bus.names(), ["center:deleted"]);
        let names: Vec<_> = ledger
            .list_centers()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["Busy"]);
    }

    #[tokio::test]
    async fn test_update_supplies_merges() {
        let center = CenterBuilder::new("A").supply("food", 60.0).build();
        let (ledger, _) = ledger_with(&[center.clone()]).await;

        let updated = ledger
            .update_supplies(
                &admin(),
                center.id,
                SupplyUpdate {
                    supplies: SupplyLevels::new().with("water", 15.0),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.supplies.get("food"), Some(60.0));
        assert_eq!(updated.supplies.get("water"), Some(15.0));
    }
}

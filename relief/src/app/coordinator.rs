//! Admission Coordinator.
//!
//! The only component that couples a guest change with a center change. Each
//! operation loads the documents it needs, runs both reducers on copies and
//! commits one transaction carrying the expected version of every document
//! plus an activity record. A lost race surfaces as a conflict and the whole
//! operation is replayed from fresh reads; any other failure leaves both
//! documents exactly as they were.
//!
//! ```text
//!         admit                discharge
//! (none) ------> [active@C] --------------> [discharged]
//!                   |  ^
//!         transfer  |  | transfer
//!                   v  |
//!               [active@C']
//! ```

use super::ledger::log_rejection;
use super::{CenterLedger, Context, GuestRegistry, capacity_alert};
use crate::aggregates::GuestAction;
use crate::metrics::{
    failure_outcome, record_admission, record_discharge, record_removal, record_transfer,
    update_center_occupancy,
};
use crate::types::{AdmitRequest, GuestUpdate, TransferRequest};
use relief_core::center::{Center, CenterId};
use relief_core::error::ReliefError;
use relief_core::event::Events;
use relief_core::guest::{Guest, GuestId, GuestProfilePatch, GuestStatus};
use relief_core::role::{Actor, Permission};
use relief_core::store::{ActivityKind, ActivityRecord, Expectation, Transaction};
use serde::Serialize;
use std::sync::Arc;

/// Result of a discharge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "guest", rename_all = "snake_case")]
pub enum DischargeOutcome {
    /// The guest was active and is now discharged; their slot was released
    Discharged(Guest),
    /// The guest was already discharged; nothing changed
    AlreadyDischarged(Guest),
}

impl DischargeOutcome {
    /// The guest record after the call.
    #[must_use]
    pub const fn guest(&self) -> &Guest {
        match self {
            Self::Discharged(guest) | Self::AlreadyDischarged(guest) => guest,
        }
    }

    /// Whether this call changed anything.
    #[must_use]
    pub const fn changed(&self) -> bool {
        matches!(self, Self::Discharged(_))
    }
}

/// Orchestrates admit, discharge, transfer and delete-with-cascade.
pub struct AdmissionCoordinator {
    ctx: Context,
    ledger: Arc<CenterLedger>,
    registry: Arc<GuestRegistry>,
}

impl AdmissionCoordinator {
    /// Creates a new `AdmissionCoordinator`
    #[must_use]
    pub fn new(ctx: Context, ledger: Arc<CenterLedger>, registry: Arc<GuestRegistry>) -> Self {
        Self {
            ctx,
            ledger,
            registry,
        }
    }

    // ========================================================================
    // Admit
    // ========================================================================

    /// Register a guest at a center and take one of its slots.
    ///
    /// When the center has no room nothing is written.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::Validation`] for a malformed request
    /// - [`ReliefError::NotFound`] when the center is absent
    /// - [`ReliefError::Forbidden`] when the caller may not manage the center
    /// - [`ReliefError::CenterFull`] when no slot is free
    /// - [`ReliefError::Conflict`] when the retry budget is exhausted
    #[tracing::instrument(skip(self, actor, request), fields(center_id = %request.center_id))]
    pub async fn admit(&self, actor: &Actor, request: AdmitRequest) -> Result<Guest, ReliefError> {
        let result = match request.validate() {
            Ok(()) => {
                let request = &request;
                self.ctx
                    .retrying("admit", || async move { self.try_admit(actor, request).await })
                    .await
            }
            Err(err) => Err(err),
        };

        match &result {
            Ok(guest) => {
                record_admission("admitted");
                tracing::info!(guest_id = %guest.id, "guest admitted");
            }
            Err(err) => {
                record_admission(failure_outcome(err));
                log_rejection(request.center_id, err);
            }
        }
        result
    }

    async fn try_admit(&self, actor: &Actor, request: &AdmitRequest) -> Result<Guest, ReliefError> {
        let center = self.ledger.load(request.center_id).await?;
        actor.authorize(Permission::ManageGuests, Some(&center.value))?;
        if !center.value.can_adjust(1) {
            return Err(ReliefError::CenterFull {
                center_id: center.value.id,
            });
        }

        let (guest, mut events) = self
            .registry
            .stage_create(center.value.id, request.profile.clone())?;
        let (target, center_events) = self.ledger.stage_adjustment(&center.value, 1)?;
        events.extend(center_events);

        let now = self.ctx.clock.now();
        let tx = Transaction::new()
            .put_guest(guest.clone(), Expectation::Absent)
            .put_center(target.clone(), center.expect())
            .record(ActivityRecord::new(
                ActivityKind::Admission,
                guest.id.clone(),
                target.id,
                now,
            ));
        self.ctx.commit("admit", tx).await?;

        events.extend(capacity_alert(&center.value, &target, now));
        self.ctx.publish(events).await;
        update_center_occupancy(&target);
        Ok(guest)
    }

    // ========================================================================
    // Discharge
    // ========================================================================

    /// Mark a guest discharged and release their slot.
    ///
    /// A second call reports [`DischargeOutcome::AlreadyDischarged`] and
    /// releases nothing. When the guest's center has been deleted the release
    /// is skipped and the discharge still succeeds.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::NotFound`] when the guest is absent
    /// - [`ReliefError::Forbidden`] when the caller may not manage the guest's center
    /// - [`ReliefError::NegativeOccupancy`] when the center's counter is already zero
    /// - [`ReliefError::Conflict`] when the retry budget is exhausted
    #[tracing::instrument(skip(self, actor), fields(guest_id = %id))]
    pub async fn discharge(&self, actor: &Actor, id: &GuestId) -> Result<DischargeOutcome, ReliefError> {
        self.discharge_with(actor, id, None).await
    }

    async fn discharge_with(
        &self,
        actor: &Actor,
        id: &GuestId,
        patch: Option<GuestProfilePatch>,
    ) -> Result<DischargeOutcome, ReliefError> {
        let patch = &patch;
        let outcome = self
            .ctx
            .retrying("discharge", || async move {
                self.try_discharge(actor, id, patch.clone()).await
            })
            .await
            .inspect_err(|err| tracing::debug!(error = %err, "discharge failed"))?;

        match &outcome {
            DischargeOutcome::Discharged(guest) => {
                record_discharge("discharged");
                tracing::info!(center_id = %guest.center_id, "guest discharged");
            }
            DischargeOutcome::AlreadyDischarged(_) => {
                record_discharge("already_discharged");
                tracing::debug!("guest already discharged");
            }
        }
        Ok(outcome)
    }

    async fn try_discharge(
        &self,
        actor: &Actor,
        id: &GuestId,
        patch: Option<GuestProfilePatch>,
    ) -> Result<DischargeOutcome, ReliefError> {
        let current = self.registry.load(id).await?;
        let center = self.ledger.load_optional(current.value.center_id).await?;
        actor.authorize(Permission::ManageGuests, center.as_ref().map(|c| &c.value))?;

        if !current.value.is_active() {
            return match patch {
                Some(patch) if !patch.is_empty() => {
                    let guest = self.registry.update(id, patch).await?;
                    Ok(DischargeOutcome::AlreadyDischarged(guest))
                }
                _ => Ok(DischargeOutcome::AlreadyDischarged(current.value)),
            };
        }

        let (amended, mut events) = self.amend(&current.value, patch)?;
        let (guest, discharge_events) = self.registry.stage(&amended, GuestAction::Discharge)?;
        events.extend(discharge_events);

        let now = self.ctx.clock.now();
        let mut tx = Transaction::new()
            .put_guest(guest.clone(), current.expect())
            .record(ActivityRecord::new(
                ActivityKind::Discharge,
                guest.id.clone(),
                guest.center_id,
                now,
            ));

        let mut released = None;
        if let Some(center) = &center {
            let (source, center_events) = self
                .ledger
                .stage_adjustment(&center.value, -1)
                .inspect_err(|err| log_rejection(center.value.id, err))?;
            events.extend(center_events);
            tx = tx.put_center(source.clone(), center.expect());
            released = Some(source);
        } else {
            tracing::warn!(
                center_id = %guest.center_id,
                "guest's center no longer exists, skipping occupancy release"
            );
        }

        self.ctx.commit("discharge", tx).await?;
        self.ctx.publish(events).await;
        if let Some(source) = &released {
            update_center_occupancy(source);
        }
        Ok(DischargeOutcome::Discharged(guest))
    }

    // ========================================================================
    // Transfer
    // ========================================================================

    /// Move an active guest to another center: release a slot at the source,
    /// take one at the target and append to the guest's transfer history,
    /// all in one commit.
    ///
    /// A source center that no longer exists is skipped.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::NotFound`] when the guest or the target is absent
    /// - [`ReliefError::SameCenter`] when the target is the current center
    /// - [`ReliefError::Validation`] when the guest is discharged
    /// - [`ReliefError::Forbidden`] when the caller may manage neither center
    /// - [`ReliefError::CenterFull`] when the target has no free slot
    /// - [`ReliefError::Conflict`] when the retry budget is exhausted
    #[tracing::instrument(
        skip(self, actor, request),
        fields(guest_id = %id, target = %request.target_center_id)
    )]
    pub async fn transfer(
        &self,
        actor: &Actor,
        id: &GuestId,
        request: TransferRequest,
    ) -> Result<Guest, ReliefError> {
        self.transfer_with(actor, id, request.target_center_id, None).await
    }

    async fn transfer_with(
        &self,
        actor: &Actor,
        id: &GuestId,
        target: CenterId,
        patch: Option<GuestProfilePatch>,
    ) -> Result<Guest, ReliefError> {
        let patch = &patch;
        let result = self
            .ctx
            .retrying("transfer", || async move {
                self.try_transfer(actor, id, target, patch.clone()).await
            })
            .await;

        match &result {
            Ok(guest) => {
                record_transfer("transferred");
                tracing::info!(center_id = %guest.center_id, "guest transferred");
            }
            Err(err) => {
                record_transfer(failure_outcome(err));
                log_rejection(target, err);
            }
        }
        result
    }

    async fn try_transfer(
        &self,
        actor: &Actor,
        id: &GuestId,
        target_id: CenterId,
        patch: Option<GuestProfilePatch>,
    ) -> Result<Guest, ReliefError> {
        let current = self.registry.load(id).await?;
        if current.value.center_id == target_id {
            return Err(ReliefError::SameCenter {
                center_id: target_id,
            });
        }
        let target = self.ledger.load(target_id).await?;
        let source = self.ledger.load_optional(current.value.center_id).await?;
        actor.authorize_transfer(source.as_ref().map(|c| &c.value), &target.value)?;

        if !current.value.is_active() {
            return Err(ReliefError::invalid(
                "status",
                "discharged guests cannot be transferred",
            ));
        }
        if !target.value.can_adjust(1) {
            return Err(ReliefError::CenterFull {
                center_id: target_id,
            });
        }

        let (amended, mut events) = self.amend(&current.value, patch)?;
        let (guest, move_events) = self
            .registry
            .stage(&amended, GuestAction::Relocate { to: target_id })?;
        events.extend(move_events);

        let now = self.ctx.clock.now();
        let mut tx = Transaction::new().put_guest(guest.clone(), current.expect());

        let mut touched: Vec<(Center, Center)> = Vec::with_capacity(2);
        if let Some(source) = &source {
            let (released, source_events) = self.ledger.stage_adjustment(&source.value, -1)?;
            events.extend(source_events);
            tx = tx.put_center(released.clone(), source.expect());
            touched.push((source.value.clone(), released));
        }
        let (filled, target_events) = self.ledger.stage_adjustment(&target.value, 1)?;
        events.extend(target_events);
        tx = tx
            .put_center(filled.clone(), target.expect())
            .record(
                ActivityRecord::new(ActivityKind::Transfer, guest.id.clone(), target_id, now)
                    .from_center(current.value.center_id),
            );
        touched.push((target.value.clone(), filled));

        self.ctx.commit("transfer", tx).await?;

        for (before, after) in &touched {
            events.extend(capacity_alert(before, after, now));
            update_center_occupancy(after);
        }
        self.ctx.publish(events).await;
        Ok(guest)
    }

    // ========================================================================
    // Delete with cascade
    // ========================================================================

    /// Delete a guest record outright, releasing their slot when they were
    /// still active.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::NotFound`] when the guest is absent
    /// - [`ReliefError::Forbidden`] when the caller may not manage the guest's center
    /// - [`ReliefError::Conflict`] when the retry budget is exhausted
    #[tracing::instrument(skip(self, actor), fields(guest_id = %id))]
    pub async fn delete_guest(&self, actor: &Actor, id: &GuestId) -> Result<Guest, ReliefError> {
        let removed = self
            .ctx
            .retrying("delete_guest", || async move { self.try_delete(actor, id).await })
            .await?;

        record_removal();
        tracing::info!(center_id = %removed.center_id, "guest removed");
        Ok(removed)
    }

    async fn try_delete(&self, actor: &Actor, id: &GuestId) -> Result<Guest, ReliefError> {
        let current = self.registry.load(id).await?;
        let center = self.ledger.load_optional(current.value.center_id).await?;
        actor.authorize(Permission::ManageGuests, center.as_ref().map(|c| &c.value))?;

        let mut events = self.registry.stage_remove(&current.value)?;
        let now = self.ctx.clock.now();
        let mut tx = Transaction::new()
            .delete_guest(current.value.id.clone(), current.version)
            .record(ActivityRecord::new(
                ActivityKind::Removal,
                current.value.id.clone(),
                current.value.center_id,
                now,
            ));

        let mut released = None;
        if let Some(center) = center.filter(|_| current.value.is_active()) {
            let (source, center_events) = self
                .ledger
                .stage_adjustment(&center.value, -1)
                .inspect_err(|err| log_rejection(center.value.id, err))?;
            events.extend(center_events);
            tx = tx.put_center(source.clone(), center.expect());
            released = Some(source);
        }

        self.ctx.commit("delete_guest", tx).await?;
        self.ctx.publish(events).await;
        if let Some(source) = &released {
            update_center_occupancy(source);
        }
        Ok(current.value)
    }

    // ========================================================================
    // Generic update
    // ========================================================================

    /// Apply a guest update, routing capacity-affecting parts through the
    /// coupled operations.
    ///
    /// - `status: discharged` on an active guest runs a discharge
    /// - a different `center_id` runs a transfer
    /// - the profile edits are committed together with either, or alone
    ///
    /// Re-activating a discharged guest is rejected; that is a new admission.
    ///
    /// # Errors
    ///
    /// Whatever the routed operation returns, plus [`ReliefError::Validation`]
    /// for a malformed or contradictory update.
    #[tracing::instrument(skip(self, actor, update), fields(guest_id = %id))]
    pub async fn update_guest(
        &self,
        actor: &Actor,
        id: &GuestId,
        update: GuestUpdate,
    ) -> Result<Guest, ReliefError> {
        update.validate()?;
        let current = self.registry.load(id).await?;

        if update.status == Some(GuestStatus::Active) && !current.value.is_active() {
            return Err(ReliefError::invalid(
                "status",
                "a discharged guest is re-admitted through admission, not an update",
            ));
        }
        if update.status == Some(GuestStatus::Discharged) {
            let outcome = self.discharge_with(actor, id, Some(update.profile)).await?;
            return Ok(outcome.guest().clone());
        }
        if let Some(target) = update.center_id.filter(|c| *c != current.value.center_id) {
            return self.transfer_with(actor, id, target, Some(update.profile)).await;
        }

        let center = self.ledger.load_optional(current.value.center_id).await?;
        actor.authorize(Permission::ManageGuests, center.as_ref().map(|c| &c.value))?;
        self.registry.update(id, update.profile).await
    }

    fn amend(
        &self,
        guest: &Guest,
        patch: Option<GuestProfilePatch>,
    ) -> Result<(Guest, Events), ReliefError> {
        match patch.filter(|p| !p.is_empty()) {
            Some(patch) => self.registry.stage(guest, GuestAction::Amend(patch)),
            None => Ok((guest.clone(), Events::new())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StatsConfig;
    use crate::app::Services;
    use relief_core::center::CenterStatus;
    use relief_core::event_bus::EventBus;
    use relief_core::guest::GuestProfile;
    use relief_core::role::Role;
    use relief_core::store::ShelterStore;
    use relief_runtime::{InMemoryShelterStore, RetryPolicy};
    use relief_testing::faults::RecordingEventBus;
    use relief_testing::fixtures::{CenterBuilder, discharged_guest, guest};
    use relief_testing::{SequentialIdGenerator, test_clock};

    struct Harness {
        services: Services,
        store: Arc<InMemoryShelterStore>,
        bus: Arc<RecordingEventBus>,
    }

    async fn harness(centers: &[Center], guests: &[Guest]) -> Harness {
        let store = Arc::new(InMemoryShelterStore::new());
        let mut tx = Transaction::new();
        for center in centers {
            tx = tx.put_center(center.clone(), Expectation::Absent);
        }
        for guest in guests {
            tx = tx.put_guest(guest.clone(), Expectation::Absent);
        }
        store.commit(tx).await.unwrap();

        let bus = Arc::new(RecordingEventBus::new());
        let ctx = Context::new(
            Arc::clone(&store) as Arc<dyn ShelterStore>,
            Arc::clone(&bus) as Arc<dyn EventBus>,
            Arc::new(test_clock()),
            Arc::new(SequentialIdGenerator::new()),
            RetryPolicy::default(),
        );
        Harness {
            services: Services::new(ctx, StatsConfig::default()),
            store,
            bus,
        }
    }

    fn admin() -> Actor {
        Actor::new("admin", Role::Admin)
    }

    fn admit_to(center_id: CenterId, first: &str) -> AdmitRequest {
        AdmitRequest {
            center_id,
            profile: GuestProfile::named(first, "Doe"),
        }
    }

    #[tokio::test]
    async fn test_admit_until_full() {
        let a = CenterBuilder::new("A").capacity(1).build();
        let h = harness(&[a.clone()], &[]).await;
        let coordinator = &h.services.coordinator;

        let g1 = coordinator.admit(&admin(), admit_to(a.id, "G1")).await.unwrap();
        assert_eq!(g1.center_id, a.id);
        let center = h.services.ledger.get_center(a.id).await.unwrap();
        assert_eq!(center.current_occupancy, 1);
        assert_eq!(center.status, CenterStatus::Full);

        let err = coordinator.admit(&admin(), admit_to(a.id, "G2")).await.unwrap_err();
        assert_eq!(err, ReliefError::CenterFull { center_id: a.id });
        assert_eq!(h.services.ledger.get_center(a.id).await.unwrap().current_occupancy, 1);
        assert_eq!(h.services.registry.find_by_center(a.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admit_publishes_guest_then_center() {
        let a = CenterBuilder::new("A").capacity(1).managed_by("rc-1").build();
        let h = harness(&[a.clone()], &[]).await;

        h.services.coordinator.admit(&admin(), admit_to(a.id, "G1")).await.unwrap();
        assert_eq!(h.bus.names(), ["guest:created", "center:updated", "notification"]);
        let alert = &h.bus.published()[2];
        assert_eq!(alert.channel.to_string(), "user:rc-1");
    }

    #[tokio::test]
    async fn test_admit_unknown_center_writes_nothing() {
        let h = harness(&[], &[]).await;
        let err = h
            .services
            .coordinator
            .admit(&admin(), admit_to(CenterId::new(), "G1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(h.services.registry.list(Default::default()).await.unwrap().is_empty());
        assert!(h.bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_moves_one_slot() {
        let a = CenterBuilder::new("A").capacity(1).occupancy(1).build();
        let b = CenterBuilder::new("B").capacity(5).build();
        let g1 = guest("G1", a.id);
        let h = harness(&[a.clone(), b.clone()], &[g1.clone()]).await;

        let moved = h
            .services
            .coordinator
            .transfer(&admin(), &g1.id, TransferRequest { target_center_id: b.id })
            .await
            .unwrap();

        assert_eq!(moved.center_id, b.id);
        assert_eq!(moved.transfer_history.len(), 1);
        assert_eq!(moved.transfer_history[0].from_center_id, a.id);
        assert_eq!(moved.transfer_history[0].to_center_id, b.id);

        let a = h.services.ledger.get_center(a.id).await.unwrap();
        let b = h.services.ledger.get_center(b.id).await.unwrap();
        assert_eq!((a.current_occupancy, a.status), (0, CenterStatus::Active));
        assert_eq!(b.current_occupancy, 1);
        let centers = h.store.list_centers().await.unwrap();
        assert!(centers.iter().all(|c| c.value.is_consistent()));
    }

    #[tokio::test]
    async fn test_transfer_rejections() {
        let a = CenterBuilder::new("A").capacity(2).occupancy(1).build();
        let full = CenterBuilder::new("Full").capacity(1).occupancy(1).build();
        let g1 = guest("G1", a.id);
        let gone = discharged_guest("G2", a.id);
        let h = harness(&[a.clone(), full.clone()], &[g1.clone(), gone.clone()]).await;
        let coordinator = &h.services.coordinator;

        let same = coordinator
            .transfer(&admin(), &g1.id, TransferRequest { target_center_id: a.id })
            .await
            .unwrap_err();
        assert_eq!(same.code(), "SAME_CENTER");

        let full_err = coordinator
            .transfer(&admin(), &g1.id, TransferRequest { target_center_id: full.id })
            .await
            .unwrap_err();
        assert_eq!(full_err.code(), "CENTER_FULL");

        let missing = coordinator
            .transfer(&admin(), &g1.id, TransferRequest { target_center_id: CenterId::new() })
            .await
            .unwrap_err();
        assert_eq!(missing.code(), "NOT_FOUND");

        assert_eq!(h.services.ledger.get_center(a.id).await.unwrap().current_occupancy, 1);
        assert_eq!(h.services.registry.find_by_id(&g1.id).await.unwrap().center_id, a.id);
        assert!(h.bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_discharge_twice() {
        let b = CenterBuilder::new("B").capacity(5).occupancy(1).build();
        let g1 = guest("G1", b.id);
        let h = harness(&[b.clone()], &[g1.clone()]).await;
        let coordinator = &h.services.coordinator;

        let first = coordinator.discharge(&admin(), &g1.id).await.unwrap();
        assert!(first.changed());
        assert_eq!(first.guest().status, GuestStatus::Discharged);
        assert_eq!(h.services.ledger.get_center(b.id).await.unwrap().current_occupancy, 0);

        let second = coordinator.discharge(&admin(), &g1.id).await.unwrap();
        assert!(matches!(second, DischargeOutcome::AlreadyDischarged(_)));
        assert_eq!(h.services.ledger.get_center(b.id).await.unwrap().current_occupancy, 0);
    }

    #[tokio::test]
    async fn test_discharge_after_center_deleted() {
        let g1 = guest("G1", CenterId::new());
        let h = harness(&[], &[g1.clone()]).await;

        let outcome = h.services.coordinator.discharge(&admin(), &g1.id).await.unwrap();
        assert!(outcome.changed());
        assert_eq!(h.bus.names(), ["guest:updated"]);
    }

    #[tokio::test]
    async fn test_delete_guest_releases_slot_only_when_active() {
        let a = CenterBuilder::new("A").capacity(3).occupancy(1).build();
        let active = guest("G1", a.id);
        let gone = discharged_guest("G2", a.id);
        let h = harness(&[a.clone()], &[active.clone(), gone.clone()]).await;
        let coordinator = &h.services.coordinator;

        coordinator.delete_guest(&admin(), &gone.id).await.unwrap();
        assert_eq!(h.services.ledger.get_center(a.id).await.unwrap().current_occupancy, 1);

        coordinator.delete_guest(&admin(), &active.id).await.unwrap();
        assert_eq!(h.services.ledger.get_center(a.id).await.unwrap().current_occupancy, 0);

        let err = coordinator.delete_guest(&admin(), &active.id).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_routes_status_and_center() {
        let a = CenterBuilder::new("A").capacity(3).occupancy(2).build();
        let b = CenterBuilder::new("B").capacity(3).build();
        let g1 = guest("G1", a.id);
        let g2 = guest("G2", a.id);
        let h = harness(&[a.clone(), b.clone()], &[g1.clone(), g2.clone()]).await;
        let coordinator = &h.services.coordinator;

        let moved = coordinator
            .update_guest(
                &admin(),
                &g1.id,
                GuestUpdate {
                    center_id: Some(b.id),
                    profile: GuestProfilePatch {
                        notes: Some("moved for medical care".into()),
                        ..GuestProfilePatch::default()
                    },
                    ..GuestUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.center_id, b.id);
        assert_eq!(moved.profile.notes.as_deref(), Some("moved for medical care"));

        let discharged = coordinator
            .update_guest(
                &admin(),
                &g2.id,
                GuestUpdate {
                    status: Some(GuestStatus::Discharged),
                    ..GuestUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(discharged.status, GuestStatus::Discharged);

        assert_eq!(h.services.ledger.get_center(a.id).await.unwrap().current_occupancy, 0);
        assert_eq!(h.services.ledger.get_center(b.id).await.unwrap().current_occupancy, 1);

        let err = coordinator
            .update_guest(
                &admin(),
                &g2.id,
                GuestUpdate {
                    status: Some(GuestStatus::Active),
                    ..GuestUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_rescue_center_scope() {
        let own = CenterBuilder::new("Own").managed_by("rc-1").build();
        let other = CenterBuilder::new("Other").managed_by("rc-2").build();
        let h = harness(&[own.clone(), other.clone()], &[]).await;
        let actor = Actor::new("rc-1", Role::RescueCenter);
        let coordinator = &h.services.coordinator;

        let g = coordinator.admit(&actor, admit_to(own.id, "Mine")).await.unwrap();
        let err = coordinator.admit(&actor, admit_to(other.id, "Theirs")).await.unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        // Managing the source is enough to move a guest out.
        coordinator
            .transfer(&actor, &g.id, TransferRequest { target_center_id: other.id })
            .await
            .unwrap();

        let citizen = Actor::new("c-1", Role::Citizen);
        let err = coordinator.discharge(&citizen, &g.id).await.unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }
}

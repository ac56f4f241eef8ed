//! In-memory [`ShelterStore`] with per-document optimistic concurrency.
//!
//! Every document lives in its own slot guarded by an async mutex. A commit
//! locks only the slots its transaction touches, always in the same global
//! order (centers by id, then guests by id), checks every expected version,
//! and then applies all writes before releasing any lock. There is no lock
//! over the whole ledger, so operations on unrelated centers run in parallel
//! while operations on the same center are linearized by its slot.

use chrono::{DateTime, Utc};
use relief_core::center::{Center, CenterId};
use relief_core::guest::{Guest, GuestId};
use relief_core::store::{
    ActivityRecord, Expectation, GuestQuery, ShelterStore, StoreError, StoreFuture, Transaction,
    Versioned, Write,
};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

type Slot<T> = Arc<Mutex<Option<Versioned<T>>>>;

/// A keyed collection of document slots.
#[derive(Debug)]
struct Collection<K, T> {
    slots: RwLock<HashMap<K, Slot<T>>>,
}

impl<K: Eq + Hash + Clone, T: Clone> Collection<K, T> {
    fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &K) -> Option<Versioned<T>> {
        let slot = self.slots.read().await.get(key).cloned()?;
        let doc = slot.lock().await;
        doc.clone()
    }

    async fn snapshot(&self) -> Vec<Versioned<T>> {
        let slots: Vec<Slot<T>> = self.slots.read().await.values().cloned().collect();
        let mut docs = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(doc) = slot.lock().await.clone() {
                docs.push(doc);
            }
        }
        docs
    }

    /// Slot for `key`, created empty when missing.
    async fn slot(&self, key: &K) -> Slot<T> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(key.clone()).or_default())
    }
}

/// Locked documents plus their staged replacements.
struct Staged<T> {
    guard: OwnedMutexGuard<Option<Versioned<T>>>,
    next: Option<Versioned<T>>,
}

impl<T: Clone> Staged<T> {
    fn new(guard: OwnedMutexGuard<Option<Versioned<T>>>) -> Self {
        let next = guard.clone();
        Self { guard, next }
    }

    fn version(&self) -> Option<u64> {
        self.next.as_ref().map(|d| d.version)
    }

    fn put(&mut self, value: T) {
        let version = self.version().map_or(1, |v| v + 1);
        self.next = Some(Versioned::new(value, version));
    }

    fn apply(mut self) {
        *self.guard = self.next;
    }
}

fn check(key: String, expected: Expectation, actual: Option<u64>) -> Result<(), StoreError> {
    if expected.is_met_by(actual) {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            key,
            expected: expected.version(),
            actual,
        })
    }
}

/// In-memory store for development, tests and single-node deployments.
#[derive(Debug)]
pub struct InMemoryShelterStore {
    centers: Collection<CenterId, Center>,
    guests: Collection<GuestId, Guest>,
    activity: Mutex<Vec<ActivityRecord>>,
}

impl Default for InMemoryShelterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryShelterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            centers: Collection::new(),
            guests: Collection::new(),
            activity: Mutex::new(Vec::new()),
        }
    }

    async fn apply(&self, tx: Transaction) -> Result<(), StoreError> {
        let writes = tx.into_writes();

        let mut center_keys: Vec<CenterId> = Vec::new();
        let mut guest_keys: Vec<GuestId> = Vec::new();
        for write in &writes {
            match write {
                Write::PutCenter { center, .. } => center_keys.push(center.id),
                Write::DeleteCenter { id, .. } => center_keys.push(*id),
                Write::PutGuest { guest, .. } => guest_keys.push(guest.id.clone()),
                Write::DeleteGuest { id, .. } => guest_keys.push(id.clone()),
                Write::AppendActivity(_) => {}
            }
        }
        center_keys.sort_unstable();
        center_keys.dedup();
        guest_keys.sort_unstable();
        guest_keys.dedup();

        // Lock order: centers ascending, then guests ascending.
        let mut centers = BTreeMap::new();
        for id in center_keys {
            let guard = self.centers.slot(&id).await.lock_owned().await;
            centers.insert(id, Staged::new(guard));
        }
        let mut guests = BTreeMap::new();
        for id in guest_keys {
            let guard = self.guests.slot(&id).await.lock_owned().await;
            guests.insert(id, Staged::new(guard));
        }

        let mut activity = Vec::new();
        for write in writes {
            match write {
                Write::PutCenter { center, expected } => {
                    if let Some(staged) = centers.get_mut(&center.id) {
                        check(format!("center/{}", center.id), expected, staged.version())?;
                        staged.put(center);
                    }
                }
                Write::DeleteCenter { id, expected } => {
                    if let Some(staged) = centers.get_mut(&id) {
                        check(format!("center/{id}"), Expectation::Version(expected), staged.version())?;
                        staged.next = None;
                    }
                }
                Write::PutGuest { guest, expected } => {
                    if let Some(staged) = guests.get_mut(&guest.id) {
                        check(format!("guest/{}", guest.id), expected, staged.version())?;
                        staged.put(guest);
                    }
                }
                Write::DeleteGuest { id, expected } => {
                    if let Some(staged) = guests.get_mut(&id) {
                        check(format!("guest/{id}"), Expectation::Version(expected), staged.version())?;
                        staged.next = None;
                    }
                }
                Write::AppendActivity(record) => activity.push(record),
            }
        }

        // Every expectation held: publish all writes while still holding every lock.
        if !activity.is_empty() {
            self.activity.lock().await.extend(activity);
        }
        centers.into_values().for_each(Staged::apply);
        guests.into_values().for_each(Staged::apply);
        Ok(())
    }
}

impl ShelterStore for InMemoryShelterStore {
    fn load_center(&self, id: CenterId) -> StoreFuture<'_, Option<Versioned<Center>>> {
        Box::pin(async move { Ok(self.centers.get(&id).await) })
    }

    fn list_centers(&self) -> StoreFuture<'_, Vec<Versioned<Center>>> {
        Box::pin(async move {
            let mut centers = self.centers.snapshot().await;
            centers.sort_by(|a, b| a.value.name.cmp(&b.value.name).then(a.value.id.cmp(&b.value.id)));
            Ok(centers)
        })
    }

    fn load_guest(&self, id: GuestId) -> StoreFuture<'_, Option<Versioned<Guest>>> {
        Box::pin(async move { Ok(self.guests.get(&id).await) })
    }

    fn find_guests(&self, query: GuestQuery) -> StoreFuture<'_, Vec<Guest>> {
        Box::pin(async move {
            let mut guests: Vec<Guest> = self
                .guests
                .snapshot()
                .await
                .into_iter()
                .map(|doc| doc.value)
                .filter(|guest| query.matches(guest))
                .collect();
            guests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            Ok(guests)
        })
    }

    fn activity_since(&self, since: DateTime<Utc>) -> StoreFuture<'_, Vec<ActivityRecord>> {
        Box::pin(async move {
            let mut records: Vec<ActivityRecord> = self
                .activity
                .lock()
                .await
                .iter()
                .filter(|r| r.occurred_at >= since)
                .cloned()
                .collect();
            records.sort_by_key(|r| r.occurred_at);
            Ok(records)
        })
    }

    fn commit(&self, tx: Transaction) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = self.apply(tx).await;
            if let Err(StoreError::Conflict { key, .. }) = &result {
                tracing::debug!(%key, "commit rejected on version mismatch");
            }
            result
        })
    }
}

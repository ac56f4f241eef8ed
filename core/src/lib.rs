//! # Relief Core
//!
//! Core traits and types for the relief capacity-consistency engine.
//!
//! This crate holds everything that is pure: the domain model for relief
//! centers and their guests, the reducer abstraction that expresses every
//! lifecycle transition as a deterministic state change, and the traits the
//! services depend on for persistence, event fan-out, time and identifiers.
//!
//! ## Core Concepts
//!
//! - **Center**: a shelter with finite capacity and an occupancy counter
//! - **Guest**: a displaced person who occupies one unit of a center's capacity
//! - **Reducer**: pure function `(State, Action, Environment) → (State, Events)`
//! - **Store**: versioned documents with all-or-nothing multi-document commits
//! - **Event bus**: best-effort fan-out of domain events to observers
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Validate first, mutate second (a rejected action leaves state untouched)
//! - Dependency Injection via Environment traits
//!
//! ## Example
//!
//! ```ignore
//! use relief_core::reducer::Reducer;
//!
//! let mut state = Some(center);
//! let events = CenterReducer::new().reduce(
//!     &mut state,
//!     CenterAction::AdjustOccupancy { delta: 1 },
//!     &env,
//! )?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod center;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod guest;
pub mod role;
pub mod store;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

pub use center::{Availability, Center, CenterId, CenterStatus, GeoPoint, Location, SupplyLevels};
pub use error::{EntityKind, FieldError, ReliefError, Result};
pub use event::{Channel, EventEnvelope, Events, Notification, ShelterEvent};
pub use guest::{Guest, GuestId, GuestProfile, GuestStatus, TransferRecord};
pub use role::{Actor, Permission, Role, UserId};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Events)`
///
/// They contain all business rules for a lifecycle and are deterministic and
/// testable without any I/O. Persistence and publication are the caller's job.
pub mod reducer {
    use crate::error::ReliefError;
    use crate::event::Events;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Contract
    ///
    /// A reducer validates the action against the current state before touching
    /// it. When it returns `Err`, `state` is exactly as it was before the call.
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for GuestReducer {
    ///     type State = Option<Guest>;
    ///     type Action = GuestAction;
    ///     type Environment = GuestEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut Option<Guest>,
    ///         action: GuestAction,
    ///         env: &GuestEnvironment,
    ///     ) -> Result<Events, ReliefError> {
    ///         match action {
    ///             GuestAction::Discharge => { /* ... */ }
    ///             // ...
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and domain events
        ///
        /// # Errors
        ///
        /// Returns the business rule the action violates. State is unchanged
        /// on error.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<Events, ReliefError>;
    }
}

/// Environment module - Dependency injection traits
///
/// All sources of non-determinism (time, identifiers) are abstracted behind
/// traits and injected, so reducers and services stay testable.
pub mod environment {
    use crate::center::CenterId;
    use crate::guest::GuestId;
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use relief_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Identifier generation for guests and centers.
    ///
    /// Implementations must produce globally unique identifiers under
    /// concurrent creation.
    pub trait IdGenerator: Send + Sync {
        /// Next guest identifier, stamped with the admission time.
        fn next_guest_id(&self, now: DateTime<Utc>) -> GuestId;

        /// Next center identifier.
        fn next_center_id(&self) -> CenterId;
    }

    /// Production identifier generator backed by random v4 UUIDs.
    ///
    /// Guest identifiers are `GST-<yyyymmddHHMMSS>-<12 hex chars>`; the 48
    /// random bits keep collisions negligible even for admissions within the
    /// same second.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UuidIdGenerator;

    impl IdGenerator for UuidIdGenerator {
        fn next_guest_id(&self, now: DateTime<Utc>) -> GuestId {
            GuestId::generate(now, uuid::Uuid::new_v4())
        }

        fn next_center_id(&self) -> CenterId {
            CenterId::new()
        }
    }
}

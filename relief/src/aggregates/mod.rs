//! Aggregate reducers for the relief engine.
//!
//! - Center: capacity counters, status, supplies
//! - Guest: registration, discharge, relocation, removal
//!
//! Reducers are pure. They validate an action against the current document,
//! mutate a copy and return the events the change produces; persisting the
//! copy is left to the services in [`crate::app`].

pub mod center;
pub mod guest;

pub use center::{CenterAction, CenterEnvironment, CenterReducer};
pub use guest::{GuestAction, GuestEnvironment, GuestReducer};

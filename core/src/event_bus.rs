//! Event bus abstraction for real-time observers.
//!
//! This module provides the [`EventBus`] trait used to fan domain events out
//! to dashboards and other subscribers after a ledger or registry change has
//! been committed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Coordinator   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 1. Commit state │◄─── Source of truth
//! │   to the store  │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 2. Publish to   │
//! │    Event Bus    │◄─── At-most-once, best effort
//! └────────┬────────┘
//!          │
//!     ┌────┴────┐
//!     ▼         ▼
//! ┌───────┐ ┌───────┐
//! │global │ │user:id│
//! └───────┘ └───────┘
//! ```
//!
//! # Key Principles
//!
//! - **Commit first**: events are published only after the store commit
//! - **At-most-once**: no replay, no durability; slow subscribers drop events
//! - **Never fatal**: a publish failure is logged by the caller and swallowed
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use relief_core::event::Channel;
//!
//! let mut stream = bus.subscribe(&[Channel::Global]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(envelope) => render(envelope),
//!         Err(e) => tracing::warn!("event stream error: {e}"),
//!     }
//! }
//! ```

use crate::event::{Channel, EventEnvelope};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// The bus has been shut down
    #[error("event bus is closed")]
    Closed,

    /// Failed to publish an event
    #[error("publish failed on channel '{channel}': {reason}")]
    PublishFailed {
        /// The channel that failed
        channel: String,
        /// The reason for failure
        reason: String,
    },

    /// Subscriber fell behind and missed events
    #[error("subscriber lagged, {0} events dropped")]
    Lagged(u64),

    /// Failed to subscribe
    #[error("subscription failed: {0}")]
    SubscriptionFailed(String),
}

/// Stream of events from a subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be held as `Arc<dyn EventBus>` by the services.
pub trait EventBus: Send + Sync {
    /// Publish one envelope to its channel.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::Closed`] after shutdown, or
    /// [`EventBusError::PublishFailed`] on transport failure.
    fn publish(
        &self,
        envelope: EventEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more channels.
    ///
    /// The returned stream yields only envelopes whose channel is in
    /// `channels`. An empty slice subscribes to [`Channel::Global`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::Closed`] after shutdown.
    fn subscribe(
        &self,
        channels: &[Channel],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}

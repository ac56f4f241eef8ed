//! Domain events and the envelope they travel in.
//!
//! Events are produced by reducers after a state change has been validated and
//! are handed to the [`EventBus`](crate::event_bus::EventBus) only once the
//! change has been committed. They are informational: nothing downstream of a
//! publish can affect ledger correctness.

use crate::center::{Center, CenterId};
use crate::guest::{Guest, GuestId};
use crate::role::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Events emitted by a single reducer call.
pub type Events = SmallVec<[ShelterEvent; 4]>;

// ============================================================================
// Notifications
// ============================================================================

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// A center reached capacity
    Capacity,
    /// A supply fell below threshold
    Supply,
    /// Anything else
    System,
}

/// Urgency of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Informational
    Low,
    /// Default
    Normal,
    /// Needs attention now
    High,
}

/// A message addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Identifier
    pub id: Uuid,
    /// Recipient
    pub user_id: UserId,
    /// Category
    pub kind: NotificationKind,
    /// Urgency
    pub priority: Priority,
    /// Short title
    pub title: String,
    /// Body text
    pub message: String,
    /// Read flag, always false when published
    pub read: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Unread notification with a fresh identifier.
    #[must_use]
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        priority: Priority,
        title: impl Into<String>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            priority,
            title: title.into(),
            message: message.into(),
            read: false,
            created_at,
        }
    }

    /// High-priority capacity alert for a center's manager.
    #[must_use]
    pub fn center_full(manager: UserId, center: &Center, at: DateTime<Utc>) -> Self {
        Self::new(
            manager,
            NotificationKind::Capacity,
            Priority::High,
            format!("{} is at capacity", center.name),
            format!(
                "{} has reached its capacity of {} guests.",
                center.name, center.total_capacity
            ),
            at,
        )
    }
}

// ============================================================================
// Domain events
// ============================================================================

/// Lifecycle events observed by dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ShelterEvent {
    /// A guest was admitted
    #[serde(rename = "guest:created")]
    GuestCreated(Box<Guest>),

    /// A guest record changed (edit, discharge or transfer)
    #[serde(rename = "guest:updated")]
    GuestUpdated(Box<Guest>),

    /// A guest record was removed
    #[serde(rename = "guest:deleted")]
    GuestDeleted {
        /// Removed guest
        guest_id: GuestId,
        /// Center they belonged to
        center_id: CenterId,
    },

    /// A center was created or changed
    #[serde(rename = "center:updated")]
    CenterUpdated(Box<Center>),

    /// A center was removed
    #[serde(rename = "center:deleted")]
    CenterDeleted {
        /// Removed center
        center_id: CenterId,
    },

    /// A user-targeted notification
    #[serde(rename = "notification")]
    Notification(Box<Notification>),
}

impl ShelterEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GuestCreated(_) => "guest:created",
            Self::GuestUpdated(_) => "guest:updated",
            Self::GuestDeleted { .. } => "guest:deleted",
            Self::CenterUpdated(_) => "center:updated",
            Self::CenterDeleted { .. } => "center:deleted",
            Self::Notification(_) => "notification",
        }
    }
}

// ============================================================================
// Channels and envelopes
// ============================================================================

/// Subscription channel: everything global, or one user's notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Channel {
    /// Entity lifecycle events
    Global,
    /// Events addressed to one user
    User(UserId),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s == "global" => Ok(Self::Global),
            Some(("user", id)) if !id.is_empty() => Ok(Self::User(UserId::new(id))),
            _ => Err(format!("invalid channel '{s}'")),
        }
    }
}

impl TryFrom<String> for Channel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.to_string()
    }
}

/// A published event with its routing channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Where the event is routed
    pub channel: Channel,
    /// The event itself
    #[serde(flatten)]
    pub event: ShelterEvent,
    /// When it happened
    pub occurred_at: DateTime<Utc>,
}

impl EventEnvelope {
    /// Routes an event.
    ///
    /// Notifications go to their recipient's channel, everything else is
    /// global.
    #[must_use]
    pub fn route(event: ShelterEvent, occurred_at: DateTime<Utc>) -> Self {
        let channel = match &event {
            ShelterEvent::Notification(n) => Channel::User(n.user_id.clone()),
            _ => Channel::Global,
        };
        Self {
            channel,
            event,
            occurred_at,
        }
    }
}

//! Best-effort event fan-out over a tokio broadcast channel.
//!
//! The broadcaster is constructed explicitly at startup and shared by
//! reference; it holds no domain state. Delivery is at-most-once: a
//! subscriber that falls more than `capacity` events behind loses the oldest
//! ones, and nothing is replayed.
//!
//! ```text
//! Coordinator ──publish──► EventBroadcaster ──► subscriber (global)
//!                                          ├──► subscriber (user:42)
//!                                          └──► subscriber (global, user:7)
//! ```

use crate::metrics::BroadcastMetrics;
use futures::stream;
use relief_core::event::{Channel, EventEnvelope};
use relief_core::event_bus::{EventBus, EventBusError, EventStream};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

/// Default per-subscriber buffer.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process [`EventBus`] with channel filtering and explicit shutdown.
///
/// # Example
///
/// ```ignore
/// let broadcaster = Arc::new(EventBroadcaster::new(1024));
/// let mut events = broadcaster.subscribe(&[Channel::Global]).await?;
///
/// broadcaster.publish(envelope).await?;
/// broadcaster.shutdown().await;
/// ```
#[derive(Debug)]
pub struct EventBroadcaster {
    sender: RwLock<Option<broadcast::Sender<EventEnvelope>>>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBroadcaster {
    /// Creates an open broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: RwLock::new(Some(sender)),
        }
    }

    /// Closes the broadcaster.
    ///
    /// Open subscriptions end after draining what they already buffered.
    /// Later publishes and subscribes fail with [`EventBusError::Closed`].
    pub async fn shutdown(&self) {
        if self.sender.write().await.take().is_some() {
            debug!("event broadcaster shut down");
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub async fn is_closed(&self) -> bool {
        self.sender.read().await.is_none()
    }

    /// Number of live subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .await
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn filtered(rx: broadcast::Receiver<EventEnvelope>, wanted: HashSet<Channel>) -> EventStream {
        Box::pin(stream::unfold((rx, wanted), |(mut rx, wanted)| async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) if wanted.contains(&envelope.channel) => {
                        return Some((Ok(envelope), (rx, wanted)));
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber lagging, events dropped");
                        BroadcastMetrics::record_dropped(skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }
}

impl EventBus for EventBroadcaster {
    fn publish(
        &self,
        envelope: EventEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        Box::pin(async move {
            let guard = self.sender.read().await;
            let sender = guard.as_ref().ok_or(EventBusError::Closed)?;
            let name = envelope.event.name();
            // No receivers is not an error: nobody is watching.
            let delivered = sender.send(envelope).unwrap_or(0);
            debug!(event = name, delivered, "event published");
            BroadcastMetrics::record_published(name);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        channels: &[Channel],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let mut wanted: HashSet<Channel> = channels.iter().cloned().collect();
        if wanted.is_empty() {
            wanted.insert(Channel::Global);
        }
        Box::pin(async move {
            let rx = self
                .sender
                .read()
                .await
                .as_ref()
                .ok_or(EventBusError::Closed)?
                .subscribe();
            debug!(channels = ?wanted, "subscriber attached");
            Ok(Self::filtered(rx, wanted))
        })
    }
}

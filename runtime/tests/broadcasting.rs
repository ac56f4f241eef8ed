//! Integration tests for event fan-out through [`EventBroadcaster`].
//!
//! Covers multi-subscriber delivery, per-user routing and shutdown while
//! publishers are still active.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::Utc;
use futures::StreamExt;
use relief_core::role::UserId;
use relief_core::event::{
    Channel, EventEnvelope, Notification, NotificationKind, Priority, ShelterEvent,
};
use relief_core::event_bus::EventBus;
use relief_runtime::EventBroadcaster;
use relief_testing::fixtures::{CenterBuilder, guest};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fixtures
// ============================================================================

fn center_updated(name: &str) -> EventEnvelope {
    let center = CenterBuilder::new(name).capacity(10).build();
    EventEnvelope::route(ShelterEvent::CenterUpdated(Box::new(center)), Utc::now())
}

fn notification_for(user: &str) -> EventEnvelope {
    let notification = Notification::new(
        UserId::new(user),
        NotificationKind::Capacity,
        Priority::High,
        "Center full",
        "North Gym has reached capacity",
        Utc::now(),
    );
    EventEnvelope::route(ShelterEvent::Notification(Box::new(notification)), Utc::now())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_every_global_subscriber_sees_events_in_publish_order() {
    let bus = EventBroadcaster::new(64);
    let mut first = bus.subscribe(&[Channel::Global]).await.unwrap();
    let mut second = bus.subscribe(&[Channel::Global]).await.unwrap();
    assert_eq!(bus.subscriber_count().await, 2);

    let c = CenterBuilder::new("North Gym").capacity(4).build();
    let g = guest("GST-1", c.id);
    bus.publish(center_updated("North Gym")).await.unwrap();
    bus.publish(EventEnvelope::route(ShelterEvent::GuestCreated(Box::new(g.clone())), Utc::now()))
        .await
        .unwrap();
    bus.publish(EventEnvelope::route(
        ShelterEvent::GuestDeleted { guest_id: g.id.clone(), center_id: c.id },
        Utc::now(),
    ))
    .await
    .unwrap();

    for stream in [&mut first, &mut second] {
        let mut names = Vec::new();
        for _ in 0..3 {
            names.push(stream.next().await.unwrap().unwrap().event.name());
        }
        assert_eq!(names, vec!["center:updated", "guest:created", "guest:deleted"]);
    }
}

#[tokio::test]
async fn test_notifications_reach_only_their_recipient() {
    let bus = EventBroadcaster::new(64);
    let mut global = bus.subscribe(&[Channel::Global]).await.unwrap();
    let mut alice = bus
        .subscribe(&[Channel::Global, Channel::User(UserId::new("alice"))])
        .await
        .unwrap();
    let mut bob = bus.subscribe(&[Channel::User(UserId::new("bob"))]).await.unwrap();

    bus.publish(notification_for("alice")).await.unwrap();
    bus.publish(center_updated("East Hall")).await.unwrap();
    bus.shutdown().await;

    let global_seen: Vec<_> = (&mut global).collect().await;
    assert_eq!(global_seen.len(), 1);
    assert_eq!(global_seen[0].as_ref().unwrap().event.name(), "center:updated");

    let alice_seen: Vec<_> = (&mut alice).map(|e| e.unwrap().event.name()).collect().await;
    assert_eq!(alice_seen, vec!["notification", "center:updated"]);

    let bob_seen = tokio::time::timeout(Duration::from_secs(1), bob.next()).await.unwrap();
    assert!(bob_seen.is_none());
}

#[tokio::test]
async fn test_empty_channel_list_subscribes_to_global() {
    let bus = EventBroadcaster::new(8);
    let mut stream = bus.subscribe(&[]).await.unwrap();

    bus.publish(notification_for("carol")).await.unwrap();
    bus.publish(center_updated("West Annex")).await.unwrap();

    let received = stream.next().await.unwrap().unwrap();
    assert_eq!(received.channel, Channel::Global);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_during_concurrent_publishing() {
    let bus = Arc::new(EventBroadcaster::new(1024));
    let stream = bus.subscribe(&[Channel::Global]).await.unwrap();

    let publishers: Vec<_> = (0..4)
        .map(|i| {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                let mut accepted = 0usize;
                for j in 0..50 {
                    if bus.publish(center_updated(&format!("C{i}-{j}"))).await.is_err() {
                        break;
                    }
                    accepted += 1;
                    tokio::task::yield_now().await;
                }
                accepted
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(5)).await;
    bus.shutdown().await;

    let mut accepted = 0;
    for publisher in publishers {
        accepted += publisher.await.unwrap();
    }
    let received = tokio::time::timeout(Duration::from_secs(5), stream.count())
        .await
        .unwrap();

    // The buffer outsizes the traffic, so nothing accepted was lost.
    assert_eq!(received, accepted);
    assert!(bus.is_closed().await);
    assert_eq!(bus.subscriber_count().await, 0);
}

#[tokio::test]
async fn test_dropped_subscription_detaches() {
    let bus = EventBroadcaster::new(8);
    let stream = bus.subscribe(&[Channel::Global]).await.unwrap();
    assert_eq!(bus.subscriber_count().await, 1);

    drop(stream);
    assert_eq!(bus.subscriber_count().await, 0);
    assert!(bus.publish(center_updated("Depot")).await.is_ok());
}

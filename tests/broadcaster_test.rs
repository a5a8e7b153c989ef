//! Broadcaster integration tests.

use std::time::Duration;

use mailshot::{Broadcaster, Notification, ProgressEvent};
use serde_json::json;
use uuid::Uuid;

fn progress(sent: usize, total: usize) -> Notification {
    Notification::Progress(ProgressEvent::new(sent, 0, total))
}

#[tokio::test]
async fn dropped_observer_does_not_stall_others() {
    let broadcaster = Broadcaster::with_capacity(4, 2);
    let gone = broadcaster.subscribe().await;
    let mut live = broadcaster.subscribe().await;
    drop(gone);

    // Far more than any channel could buffer if delivery blocked
    let publisher = {
        let broadcaster = broadcaster.clone();
        tokio::spawn(async move {
            for sent in 1..=50 {
                broadcaster.publish(progress(sent, 50)).await;
            }
        })
    };

    let mut received = Vec::new();
    while received.len() < 2 {
        match tokio::time::timeout(Duration::from_secs(5), live.recv()).await {
            Ok(Some(notification)) => received.push(notification),
            other => panic!("live observer stalled: {:?}", other),
        }
    }

    tokio::time::timeout(Duration::from_secs(5), publisher)
        .await
        .expect("publisher blocked")
        .unwrap();
    assert_eq!(received[0], progress(1, 50));
}

#[tokio::test]
async fn slow_observer_is_evicted_and_others_keep_receiving() {
    let broadcaster = Broadcaster::with_capacity(16, 2);
    let mut slow = broadcaster.subscribe().await;
    let mut fast = broadcaster.subscribe().await;

    for sent in 1..=2 {
        broadcaster.publish(progress(sent, 3)).await;
        assert_eq!(fast.recv().await, Some(progress(sent, 3)));
    }
    // slow has two buffered, the third overflows it
    broadcaster.publish(progress(3, 3)).await;
    assert_eq!(fast.recv().await, Some(progress(3, 3)));

    assert_eq!(broadcaster.observer_count().await, 1);
    assert_eq!(slow.recv().await, Some(progress(1, 3)));
    assert_eq!(slow.recv().await, Some(progress(2, 3)));
    assert_eq!(slow.recv().await, None);
}

#[tokio::test]
async fn late_subscriber_sees_only_later_events() {
    let broadcaster = Broadcaster::new();
    broadcaster.publish(progress(1, 2)).await;

    let mut late = broadcaster.subscribe().await;
    broadcaster.publish(progress(2, 2)).await;

    assert_eq!(late.recv().await, Some(progress(2, 2)));
    assert_eq!(late.try_recv(), None);
}

#[tokio::test]
async fn publish_after_shutdown_is_ignored() {
    let broadcaster = Broadcaster::new();
    broadcaster.shutdown().await;

    // Give the actor a chance to exit
    for _ in 0..10 {
        if !broadcaster.is_running() {
            break;
        }
        tokio::task::yield_now().await;
    }

    broadcaster.publish(progress(1, 1)).await;
    assert!(!broadcaster.is_running());
    assert_eq!(broadcaster.observer_count().await, 0);
}

#[test]
fn notifications_serialize_with_type_tag() {
    let event = serde_json::to_value(progress(1, 4)).unwrap();
    assert_eq!(
        event,
        json!({
            "type": "progress",
            "data": {"current": 1, "total": 4, "sent": 1, "failed": 0, "percentage": 25.0}
        })
    );

    let batch_id = Uuid::nil();
    let failed = serde_json::to_value(Notification::BatchFailed {
        batch_id,
        reason: "Unknown provider: pigeon".into(),
    })
    .unwrap();
    assert_eq!(failed["type"], "batch_failed");
    assert_eq!(failed["data"]["reason"], "Unknown provider: pigeon");
}

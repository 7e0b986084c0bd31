mod common;

use common::{ScriptedTransport, SendBehavior};
use delivery_orchestrator::config::NotificationConfig;
use delivery_orchestrator::notifications::{BroadcastSummary, NotificationFanout};
use delivery_orchestrator::store::{InMemoryRecordStore, RecordStore};
use delivery_orchestrator::{OrderStatus, Subscriber};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn fanout() -> (NotificationFanout, Arc<ScriptedTransport>, Arc<InMemoryRecordStore<Subscriber>>) {
    let store = Arc::new(InMemoryRecordStore::new());
    let transport = Arc::new(ScriptedTransport::default());
    let config = NotificationConfig {
        send_timeout_ms: 100,
        ..NotificationConfig::default()
    };
    let fanout = NotificationFanout::new(store.clone(), transport.clone(), &config);
    (fanout, transport, store)
}

#[tokio::test]
async fn test_gone_subscriber_is_evicted_and_skipped_next_time() {
    let (fanout, transport, store) = fanout();
    for id in ["c1", "c2", "c3"] {
        fanout.subscribe(id, "R1").await.unwrap();
    }
    transport.set_behavior("c2", SendBehavior::Gone);

    let summary = fanout.broadcast("R1", &json!({"hello": "world"})).await.unwrap();
    assert_eq!(summary, BroadcastSummary { sent: 2, failed: 1, evicted: 1 });
    assert!(store.get_by_key("c2").await.unwrap().is_none());

    transport.clear_attempts();
    let summary = fanout.broadcast("R1", &json!({"again": true})).await.unwrap();
    assert_eq!(summary.sent, 2);
    let mut attempts = transport.attempts();
    attempts.sort();
    assert_eq!(attempts, vec!["c1".to_string(), "c3".to_string()]);
}

#[tokio::test]
async fn test_other_failures_are_counted_not_evicted() {
    let (fanout, transport, _store) = fanout();
    fanout.subscribe("c1", "R1").await.unwrap();
    fanout.subscribe("c2", "R1").await.unwrap();
    transport.set_behavior("c1", SendBehavior::Fail);

    let summary = fanout.broadcast("R1", &json!({})).await.unwrap();
    assert_eq!(summary, BroadcastSummary { sent: 1, failed: 1, evicted: 0 });
    assert_eq!(fanout.subscribers("R1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_hanging_send_is_bounded_and_does_not_block_others() {
    let (fanout, transport, _store) = fanout();
    fanout.subscribe("slow", "R1").await.unwrap();
    fanout.subscribe("fast", "R1").await.unwrap();
    transport.set_behavior("slow", SendBehavior::Hang);

    let started = Instant::now();
    let summary = fanout.broadcast("R1", &json!({})).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(transport.delivered().len(), 1);
}

#[tokio::test]
async fn test_broadcast_is_scoped_to_tenant() {
    let (fanout, transport, _store) = fanout();
    fanout.subscribe("c1", "R1").await.unwrap();
    fanout.subscribe("c2", "R2").await.unwrap();

    let summary = fanout
        .notify_order_status_update("R2", "O1", OrderStatus::Preparing, None)
        .await
        .unwrap();
    assert_eq!(summary.sent, 1);

    let pushes = transport.delivered_json();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0]["type"], "ORDER_STATUS_UPDATE");
    assert_eq!(pushes[0]["data"]["status"], "EN_PREPARACION");
    assert_eq!(transport.delivered()[0].0, "c2");
}

#[tokio::test]
async fn test_empty_tenant_broadcast_sends_nothing() {
    let (fanout, transport, _store) = fanout();
    let summary = fanout.broadcast("nobody", &json!({})).await.unwrap();
    assert_eq!(summary, BroadcastSummary::default());
    assert!(transport.attempts().is_empty());
}

#[tokio::test]
async fn test_unsubscribe_and_resubscribe() {
    let (fanout, _transport, _store) = fanout();
    fanout.subscribe("c1", "R1").await.unwrap();
    fanout.unsubscribe("c1").await.unwrap();
    fanout.unsubscribe("c1").await.unwrap();
    assert!(fanout.subscribers("R1").await.unwrap().is_empty());

    fanout.subscribe("c1", "R1").await.unwrap();
    assert_eq!(fanout.subscribers("R1").await.unwrap().len(), 1);
}

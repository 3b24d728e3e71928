//! Integration tests for the feed consumer
//!
//! These tests run a consumer against the in-memory broker and verify
//! ordering, filtering, routing and shutdown.

mod common;

use common::{wait_until, RecordingHandler, TextRoute, TextRouter};
use feedbus::{
    ConnectionState, ConsumerEvent, Delivery, InMemoryBroker, NeverReconnect, QueueBinding,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn binding() -> QueueBinding {
    QueueBinding::new("test-queue", vec!["feed.#".to_string()])
}

#[tokio::test]
async fn test_messages_are_handled_in_delivery_order() {
    verbose_println!("Testing per-queue ordering...");

    let broker = Arc::new(InMemoryBroker::new());
    let lower = Arc::new(Mutex::new(Vec::new()));
    let upper = Arc::new(Mutex::new(Vec::new()));

    let consumer = feedbus::core::builder(broker.clone())
        .binding(binding())
        .router(TextRouter, {
            let lower = Arc::clone(&lower);
            let upper = Arc::clone(&upper);
            move |routing| {
                routing
                    .handler(TextRoute::Lower, RecordingHandler::new(lower))
                    .handler(TextRoute::Upper, RecordingHandler::new(upper))
            }
        })
        .reconnect_strategy(NeverReconnect)
        .build()
        .await
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || broker.has_queue("test-queue")).await);

    for i in 0..50 {
        broker.publish(Delivery::new("feed.a", format!("msg-{i}")));
        broker.publish(Delivery::new("feed.b", format!("MSG-{i}")));
    }
    broker.publish(Delivery::new("other.a", "ignored"));

    assert!(wait_until(Duration::from_secs(2), || lower.lock().len() == 50 && upper.lock().len() == 50).await);

    let expected_lower: Vec<String> = (0..50).map(|i| format!("msg-{i}")).collect();
    let expected_upper: Vec<String> = (0..50).map(|i| format!("MSG-{i}")).collect();
    assert_eq!(*lower.lock(), expected_lower);
    assert_eq!(*upper.lock(), expected_upper);

    assert!(wait_until(Duration::from_secs(1), || consumer.metrics().messages_routed == 100).await);
    assert_eq!(consumer.metrics().deliveries_received, 100);

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_filtered_and_unparseable_deliveries_do_not_stop_consumer() {
    let broker = Arc::new(InMemoryBroker::new());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let consumer = feedbus::core::builder(broker.clone())
        .binding(binding())
        .router(TextRouter, {
            let seen = Arc::clone(&seen);
            move |routing| routing.handler(TextRoute::Lower, RecordingHandler::new(seen))
        })
        .reconnect_strategy(NeverReconnect)
        .build()
        .await
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || broker.has_queue("test-queue")).await);

    broker.publish(Delivery::new("feed.a", vec![0xff, 0xfe]));
    broker.publish(Delivery::new("feed.a", "drop me"));
    broker.publish(Delivery::new("feed.a", "kept"));

    assert!(wait_until(Duration::from_secs(2), || seen.lock().len() == 1).await);
    assert_eq!(seen.lock()[0], "kept");

    let metrics = consumer.metrics();
    assert_eq!(metrics.parse_errors, 1);
    assert_eq!(metrics.messages_filtered, 1);
    assert_eq!(metrics.connection_state, ConnectionState::Connected);

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_unsubscribes_queue() {
    let broker = Arc::new(InMemoryBroker::new());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let consumer = feedbus::core::builder(broker.clone())
        .binding(binding())
        .router(TextRouter, {
            let seen = Arc::clone(&seen);
            move |routing| routing.handler(TextRoute::Lower, RecordingHandler::new(seen))
        })
        .build()
        .await
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || consumer.is_connected()).await);
    assert_eq!(consumer.try_recv_event(), Some(ConsumerEvent::Connected));

    consumer.shutdown().await.unwrap();

    assert!(!broker.has_queue("test-queue"));
    assert_eq!(broker.publish(Delivery::new("feed.a", "late")), 0);
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn test_build_rejects_empty_binding() {
    let broker = Arc::new(InMemoryBroker::new());

    let result = feedbus::core::builder(broker)
        .binding(QueueBinding::new("empty", Vec::new()))
        .router(TextRouter, |routing| routing)
        .build()
        .await;

    assert!(matches!(result, Err(feedbus::BusError::Configuration(_))));
}

//! Redis integration tests.
//!
//! These tests require a running Redis instance.
//! Run with: `cargo test --test redis_integration -- --ignored`
//!
//! Set `REDIS_URL` environment variable to point to your Redis instance.
//! Default: <redis://localhost:6379>

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use janta_core::services::{EventPublisher, StreamEvent, UserChannelHub};
use janta_queue::RedisPubSub;

fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

fn rejected() -> StreamEvent {
    StreamEvent::ResolutionRejected {
        id: "r1".to_string(),
        title: "Pothole".to_string(),
    }
}

/// Test that we can connect to Redis.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_redis_connection() {
    let hub = Arc::new(UserChannelHub::new());
    let pubsub = RedisPubSub::new(&get_redis_url(), "janta-test", hub).await;
    assert!(pubsub.is_ok(), "Failed to connect to Redis: {:?}", pubsub.err());
}

/// An event published by one instance reaches a session on another.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_event_crosses_instances() {
    let url = get_redis_url();
    let hub_a = Arc::new(UserChannelHub::new());
    let hub_b = Arc::new(UserChannelHub::new());
    let a = RedisPubSub::new(&url, "janta-test", hub_a)
        .await
        .expect("Failed to connect to Redis");
    let b = RedisPubSub::new(&url, "janta-test", hub_b.clone())
        .await
        .expect("Failed to connect to Redis");
    b.start().await.expect("Failed to subscribe");

    let mut session = hub_b.subscribe("staff-1");
    a.publish("staff-1", rejected()).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), session.recv())
        .await
        .expect("timed out waiting for event");
    assert_eq!(received, Some(rejected()));

    a.shutdown().await.expect("Failed to shutdown");
    b.shutdown().await.expect("Failed to shutdown");
}

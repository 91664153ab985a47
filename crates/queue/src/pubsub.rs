//! Redis Pub/Sub for cross-instance event distribution.
//!
//! A live session is registered with the instance it is connected to, but
//! the sweep or the request that produces an event may run anywhere. Every
//! instance publishes to one Redis channel and delivers what it receives to
//! its own [`UserChannelHub`].

use std::sync::Arc;

use async_trait::async_trait;
use fred::clients::{Client, SubscriberClient};
use fred::error::{Error as RedisError, ErrorKind as RedisErrorKind};
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use janta_common::{AppError, AppResult};
use janta_core::services::{EventPublisher, StreamEvent, UserChannelHub};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Pub/Sub channel names.
pub mod channels {
    /// Suffix of the channel carrying per-user events.
    pub const USER_EVENTS: &str = "user-events";

    /// Full channel name under a key prefix.
    #[must_use]
    pub fn user_events(prefix: &str) -> String {
        format!("{prefix}:{USER_EVENTS}")
    }
}

/// A live event addressed to one user, as carried over Redis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEventEnvelope {
    pub user_id: String,
    pub event: StreamEvent,
}

/// Redis Pub/Sub manager for event distribution.
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: Client,
    subscriber: SubscriberClient,
    channel: String,
    hub: Arc<UserChannelHub>,
}

impl RedisPubSub {
    /// Connect both clients. Received events go to `hub`.
    pub async fn new(
        redis_url: &str,
        prefix: &str,
        hub: Arc<UserChannelHub>,
    ) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await?;

        info!("Redis Pub/Sub initialized");

        Ok(Self {
            publisher,
            subscriber,
            channel: channels::user_events(prefix),
            hub,
        })
    }

    /// Subscribe to the event channel and start forwarding to the hub.
    pub async fn start(&self) -> Result<(), RedisError> {
        self.subscriber.subscribe(self.channel.as_str()).await?;
        info!(channel = %self.channel, "Subscribed to Redis Pub/Sub channel");

        let hub = self.hub.clone();
        let mut message_stream = self.subscriber.message_rx();

        tokio::spawn(async move {
            while let Ok(message) = message_stream.recv().await {
                if let Some(payload) = message.value.as_string() {
                    forward(&hub, &payload);
                }
            }
            info!("Pub/Sub message stream ended");
        });

        Ok(())
    }

    /// Publish an event for one user.
    pub async fn publish_to_user(
        &self,
        user_id: &str,
        event: StreamEvent,
    ) -> Result<(), RedisError> {
        let kind = event.kind();
        let envelope = UserEventEnvelope {
            user_id: user_id.to_string(),
            event,
        };
        let payload = serde_json::to_string(&envelope).map_err(|e| {
            RedisError::new(
                RedisErrorKind::InvalidArgument,
                format!("Serialization error: {e}"),
            )
        })?;
        let _: () = self
            .publisher
            .publish(self.channel.as_str(), payload)
            .await?;
        debug!(user_id, kind, "Published Pub/Sub event");
        Ok(())
    }

    /// Shutdown the Pub/Sub manager.
    pub async fn shutdown(&self) -> Result<(), RedisError> {
        self.subscriber.quit().await?;
        self.publisher.quit().await?;
        info!("Redis Pub/Sub shutdown");
        Ok(())
    }
}

/// Decode one message and hand it to the local hub.
fn forward(hub: &UserChannelHub, payload: &str) -> usize {
    match serde_json::from_str::<UserEventEnvelope>(payload) {
        Ok(envelope) => {
            let kind = envelope.event.kind();
            let delivered = hub.deliver(&envelope.user_id, envelope.event);
            debug!(user_id = %envelope.user_id, kind, delivered, "Received Pub/Sub event");
            delivered
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse Pub/Sub message");
            0
        }
    }
}

#[async_trait]
impl EventPublisher for RedisPubSub {
    async fn publish(&self, user_id: &str, event: StreamEvent) -> AppResult<()> {
        self.publish_to_user(user_id, event)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn accepted() -> StreamEvent {
        StreamEvent::ResolutionAccepted {
            id: "r1".to_string(),
            title: "Streetlight".to_string(),
        }
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(channels::user_events("janta"), "janta:user-events");
    }

    #[test]
    fn test_envelope_wire_format() {
        let envelope = UserEventEnvelope {
            user_id: "u1".to_string(),
            event: accepted(),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["event"]["type"], "resolutionAccepted");
        assert_eq!(json["event"]["body"]["id"], "r1");
    }

    #[tokio::test]
    async fn test_forward_delivers_to_addressed_user() {
        let hub = UserChannelHub::new();
        let mut session = hub.subscribe("u1");
        let payload = serde_json::to_string(&UserEventEnvelope {
            user_id: "u1".to_string(),
            event: accepted(),
        })
        .unwrap();

        assert_eq!(forward(&hub, &payload), 1);
        assert_eq!(session.recv().await, Some(accepted()));
    }

    #[test]
    fn test_forward_ignores_garbage() {
        let hub = UserChannelHub::new();
        let _session = hub.subscribe("u1");
        assert_eq!(forward(&hub, "not json"), 0);
        assert_eq!(forward(&hub, r#"{"userId":"u1","event":{"type":"nope"}}"#), 0);
    }
}

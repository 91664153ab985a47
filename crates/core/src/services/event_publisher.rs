//! Event publisher service.
//!
//! Live events are addressed to a single user. [`UserChannelHub`] delivers
//! them to the sessions connected to this process; the queue crate wraps it
//! with Redis Pub/Sub so events published on one instance reach sessions on
//! every instance.
//!
//! Delivery is at most once. Events for users with no open session are
//! dropped; the durable notification list covers them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janta_common::AppResult;
use janta_db::entities::{Severity, report};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Per-user channel capacity. Slow sessions skip what they missed.
const CHANNEL_CAPACITY: usize = 64;

/// Event types for real-time updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "body",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum StreamEvent {
    /// A report passed its deadline without being resolved.
    ReportOverdue {
        id: String,
        title: String,
        severity: Severity,
        deadline: Option<DateTime<Utc>>,
        is_overdue: bool,
    },
    /// A report was assigned to the receiving staff member.
    ReportAssigned {
        id: String,
        title: String,
        severity: Severity,
        deadline: Option<DateTime<Utc>>,
        assigned_by: String,
    },
    /// The creator accepted the resolution.
    ResolutionAccepted { id: String, title: String },
    /// The creator rejected the resolution; the report is open again.
    ResolutionRejected { id: String, title: String },
}

impl StreamEvent {
    /// Overdue alert for a report that has just been flagged.
    #[must_use]
    pub fn overdue(report: &report::Model) -> Self {
        Self::ReportOverdue {
            id: report.id.clone(),
            title: report.title.clone(),
            severity: report.severity,
            deadline: report.deadline,
            is_overdue: true,
        }
    }

    /// Name used on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ReportOverdue { .. } => "reportOverdue",
            Self::ReportAssigned { .. } => "reportAssigned",
            Self::ResolutionAccepted { .. } => "resolutionAccepted",
            Self::ResolutionRejected { .. } => "resolutionRejected",
        }
    }
}

/// Trait for publishing real-time events to a user's channel.
///
/// This allows the core services to publish events
/// without directly depending on the queue/pubsub implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to every session registered for `user_id`.
    async fn publish(&self, user_id: &str, event: StreamEvent) -> AppResult<()>;
}

/// Wrapper for boxed `EventPublisher` trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;

/// In-process registry of per-user broadcast channels.
#[derive(Default)]
pub struct UserChannelHub {
    channels: Mutex<HashMap<String, broadcast::Sender<StreamEvent>>>,
}

impl UserChannelHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a user's channel. The subscription receives events published
    /// after this call.
    pub fn subscribe(&self, user_id: &str) -> Subscription {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Subscription {
            user_id: user_id.to_string(),
            receiver: sender.subscribe(),
        }
    }

    /// Deliver an event to a user's open sessions. Returns how many
    /// sessions received it.
    pub fn deliver(&self, user_id: &str, event: StreamEvent) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = channels.get(user_id) else {
            return 0;
        };
        match sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                // Every session for this user has gone away.
                channels.remove(user_id);
                0
            }
        }
    }

    /// Number of users with at least one open channel.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| s.receiver_count() > 0)
            .count()
    }
}

#[async_trait]
impl EventPublisher for UserChannelHub {
    async fn publish(&self, user_id: &str, event: StreamEvent) -> AppResult<()> {
        let kind = event.kind();
        let delivered = self.deliver(user_id, event);
        tracing::debug!(user_id = %user_id, kind, delivered, "Published live event");
        Ok(())
    }
}

/// A live session's handle on its user's channel.
pub struct Subscription {
    user_id: String,
    receiver: broadcast::Receiver<StreamEvent>,
}

impl Subscription {
    /// The user this subscription listens for.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Wait for the next event. Returns `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %self.user_id, skipped, "Live session lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

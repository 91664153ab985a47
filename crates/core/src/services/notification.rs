//! Notification service.

use chrono::Utc;
use janta_common::{AppError, AppResult, IdGenerator, short_id};
use janta_db::{NotificationStoreRef, entities::notification};

use crate::services::event_publisher::{EventPublisherService, StreamEvent};

/// Message stored when a report is flagged overdue.
#[must_use]
pub fn overdue_message(report_id: &str) -> String {
    format!("Report #{} is now OVERDUE!", short_id(report_id))
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    store: NotificationStoreRef,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(store: NotificationStoreRef) -> Self {
        Self {
            store,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Append a durable record and push a live event to one user.
    ///
    /// The live push is attempted even if the record cannot be written and
    /// its failure is only logged. The returned error is the record's.
    pub async fn deliver(
        &self,
        user_id: &str,
        report_id: &str,
        message: String,
        event: StreamEvent,
    ) -> AppResult<notification::Model> {
        let record = self
            .store
            .insert(notification::Model {
                id: self.id_gen.generate(),
                user_id: user_id.to_string(),
                report_id: report_id.to_string(),
                message,
                is_read: false,
                created_at: Utc::now(),
            })
            .await;

        if let Some(ref event_publisher) = self.event_publisher {
            if let Err(e) = event_publisher.publish(user_id, event).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to publish live event");
            }
        }

        record
    }

    /// A user's notifications, newest first.
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<notification::Model>> {
        self.store.find_by_user(user_id).await
    }

    /// Remove one of the user's notifications.
    pub async fn remove(&self, user_id: &str, notification_id: &str) -> AppResult<()> {
        if self.store.delete_for_user(user_id, notification_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "Notification {notification_id} not found"
            )))
        }
    }

    /// Remove all of the user's notifications.
    pub async fn clear(&self, user_id: &str) -> AppResult<u64> {
        self.store.delete_all_for_user(user_id).await
    }

    /// Count unread notifications.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        self.store.count_unread(user_id).await
    }
}

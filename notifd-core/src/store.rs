//! Persistent notification records.

use crate::entities::notification::{Notification, NotificationStatus};
use crate::entities::notification_records::{InsertPendingNotification, UpdateNotificationStatus};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use thiserror::Error;
use time::OffsetDateTime;

/// Errors reported by a [`StatusStore`].
///
/// None of these alter a delivery outcome; callers log them and move on.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("status store unavailable: {0}")]
    Unavailable(String),

    #[error("notification {0} already exists")]
    Duplicate(String),

    #[error("notification {0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                PersistenceError::Unavailable(value.to_string())
            }
            other => PersistenceError::Database(other),
        }
    }
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Create the record for a freshly accepted notification.
    async fn insert_pending(&self, notification: &Notification) -> Result<(), PersistenceError>;

    /// Record a terminal status and refresh `updated_at`.
    async fn update_status(
        &self,
        id: &str,
        status: NotificationStatus,
        updated_at: OffsetDateTime,
    ) -> Result<(), PersistenceError>;
}

/// [`StatusStore`] backed by the `notifications` table.
#[derive(Clone)]
pub struct PgStatusStore {
    processor: DatabaseProcessor,
}

impl PgStatusStore {
    pub fn new(processor: DatabaseProcessor) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn insert_pending(&self, notification: &Notification) -> Result<(), PersistenceError> {
        self.processor
            .process(InsertPendingNotification {
                notification: notification.clone(),
            })
            .await
            .map_err(|e| {
                let duplicate = e
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation());
                if duplicate {
                    PersistenceError::Duplicate(notification.id.clone())
                } else {
                    e.into()
                }
            })
    }

    async fn update_status(
        &self,
        id: &str,
        status: NotificationStatus,
        updated_at: OffsetDateTime,
    ) -> Result<(), PersistenceError> {
        let touched = self
            .processor
            .process(UpdateNotificationStatus {
                id: id.to_string(),
                status,
                updated_at,
            })
            .await?;

        if touched == 0 {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

use crate::entities::notification::{Notification, NotificationStatus};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::types::Json;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
/// Insert a freshly accepted notification.
///
/// Fails with a unique violation when the id was already accepted.
pub struct InsertPendingNotification {
    pub notification: Notification,
}

impl Processor<InsertPendingNotification> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertPendingNotification")]
    async fn process(&self, insert: InsertPendingNotification) -> Result<(), sqlx::Error> {
        let n = insert.notification;
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, user_id, channel, message, status, created_at, updated_at, meta_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&n.id)
        .bind(&n.recipient_id)
        .bind(n.channel.as_str())
        .bind(&n.body)
        .bind(n.status)
        .bind(n.created_at)
        .bind(n.updated_at)
        .bind(Json(&n.attributes))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Record the terminal status of a notification.
///
/// Idempotent: writing the same status twice leaves the row unchanged apart
/// from `updated_at`. Returns the number of rows touched.
pub struct UpdateNotificationStatus {
    pub id: String,
    pub status: NotificationStatus,
    pub updated_at: OffsetDateTime,
}

impl Processor<UpdateNotificationStatus> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateNotificationStatus")]
    async fn process(&self, update: UpdateNotificationStatus) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(&update.id)
        .bind(update.status)
        .bind(update.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

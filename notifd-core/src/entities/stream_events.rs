use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use time::OffsetDateTime;

/// One entry of the topic-partitioned `stream_events` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StreamEvent {
    pub id: i64,
    pub topic: String,
    pub message_key: Option<String>,
    pub payload: Vec<u8>,
    pub published_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
/// Atomically remove and return the oldest event on a topic.
///
/// `SKIP LOCKED` lets several consumers share a topic without handing the
/// same event to two of them.
pub struct ClaimNextStreamEvent {
    pub topic: String,
}

impl Processor<ClaimNextStreamEvent> for DatabaseProcessor {
    type Output = Option<StreamEvent>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimNextStreamEvent")]
    async fn process(
        &self,
        claim: ClaimNextStreamEvent,
    ) -> Result<Option<StreamEvent>, sqlx::Error> {
        let event = sqlx::query_as::<_, StreamEvent>(
            r#"
            DELETE FROM stream_events
            WHERE id = (
                SELECT id FROM stream_events
                WHERE topic = $1
                ORDER BY id
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, topic, message_key, payload, published_at
            "#,
        )
        .bind(&claim.topic)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }
}

#[derive(Debug, Clone)]
/// Append an event to a topic. Returns the new event id.
pub struct AppendStreamEvent {
    pub topic: String,
    pub message_key: Option<String>,
    pub payload: Vec<u8>,
}

impl Processor<AppendStreamEvent> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AppendStreamEvent")]
    async fn process(&self, append: AppendStreamEvent) -> Result<i64, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO stream_events (topic, message_key, payload)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&append.topic)
        .bind(&append.message_key)
        .bind(&append.payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

#[derive(Debug, Clone)]
/// Count events waiting on a topic.
///
/// Also run at startup to check that the stream table is reachable.
pub struct CountStreamBacklog {
    pub topic: String,
}

impl Processor<CountStreamBacklog> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountStreamBacklog")]
    async fn process(&self, count: CountStreamBacklog) -> Result<i64, sqlx::Error> {
        let backlog: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM stream_events WHERE topic = $1
            "#,
        )
        .bind(&count.topic)
        .fetch_one(&self.pool)
        .await?;
        Ok(backlog)
    }
}

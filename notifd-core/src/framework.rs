use sqlx::PgPool;

/// Executes the `Processor` query objects in [`crate::entities`] against
/// the shared connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Round-trip a trivial query; used to fail fast at startup.
    #[tracing::instrument(skip_all, err, name = "SQL:Ping")]
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

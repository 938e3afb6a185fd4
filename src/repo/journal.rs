use crate::error::WorkQueueResult;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::any::AnyPool;
use uuid::Uuid;

/// `recordTaskActivity`: an append-only operational journal
/// consulted for audit trails (e.g. scenario S6's requirement that a reset
/// element's subscription id survive "only in audit").
#[async_trait]
pub trait JournalRepo: Send + Sync {
    async fn record(&self, name: &str, message: &str) -> WorkQueueResult<()>;
}

pub struct SqlxJournalRepo {
    pool: AnyPool,
}

impl SqlxJournalRepo {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JournalRepo for SqlxJournalRepo {
    async fn record(&self, name: &str, message: &str) -> WorkQueueResult<()> {
        sqlx::query("INSERT INTO task_activity (id, name, message, recorded_at) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .bind(message)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

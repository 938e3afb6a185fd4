use crate::error::{WorkQueueError, WorkQueueResult};
use crate::model::{InboxElement, Status};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::any::AnyPool;
use sqlx::Row;

use super::{exhausted_retries, DEFAULT_MAX_CONFLICT_RETRIES};

#[async_trait]
pub trait InboxRepo: Send + Sync {
    async fn insert(&self, inbox: &InboxElement) -> WorkQueueResult<()>;
    async fn save(&self, inbox: &InboxElement) -> WorkQueueResult<()>;
    async fn update_status(&self, request_name: &str, status: Status) -> WorkQueueResult<()>;
    async fn get(&self, request_name: &str) -> WorkQueueResult<Option<InboxElement>>;
    async fn get_all(&self) -> WorkQueueResult<Vec<InboxElement>>;
    async fn get_open_for_new_data(&self) -> WorkQueueResult<Vec<InboxElement>>;
    async fn delete(&self, request_name: &str) -> WorkQueueResult<()>;
}

pub struct SqlxInboxRepo {
    pool: AnyPool,
}

impl SqlxInboxRepo {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    fn row_to_inbox(row: &sqlx::any::AnyRow) -> WorkQueueResult<InboxElement> {
        let data: String = row.try_get("data")?;
        serde_json::from_str(&data).map_err(|e| WorkQueueError::Repo(e.to_string()))
    }
}

#[async_trait]
impl InboxRepo for SqlxInboxRepo {
    async fn insert(&self, inbox: &InboxElement) -> WorkQueueResult<()> {
        let data = serde_json::to_string(inbox).map_err(|e| WorkQueueError::Repo(e.to_string()))?;
        sqlx::query(
            "INSERT INTO inbox_elements (request_name, status, open_for_new_data, insert_time, update_time, version, data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&inbox.request_name)
        .bind(inbox.status.to_string())
        .bind(inbox.open_for_new_data)
        .bind(inbox.insert_time)
        .bind(inbox.update_time)
        .bind(inbox.version)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save(&self, inbox: &InboxElement) -> WorkQueueResult<()> {
        let mut candidate = inbox.clone();
        for _ in 0..DEFAULT_MAX_CONFLICT_RETRIES {
            candidate.update_time = Utc::now();
            let data = serde_json::to_string(&candidate).map_err(|e| WorkQueueError::Repo(e.to_string()))?;
            let result = sqlx::query(
                "UPDATE inbox_elements SET status = $1, open_for_new_data = $2, update_time = $3, version = $4, data = $5 \
                 WHERE request_name = $6 AND version = $7",
            )
            .bind(candidate.status.to_string())
            .bind(candidate.open_for_new_data)
            .bind(candidate.update_time)
            .bind(candidate.version + 1)
            .bind(data)
            .bind(&candidate.request_name)
            .bind(candidate.version)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                return Ok(());
            }

            let current = self
                .get(&candidate.request_name)
                .await?
                .ok_or_else(|| WorkQueueError::Repo(format!("inbox {} vanished", candidate.request_name)))?;

            let mut merged = current.clone();
            merged.status = current.status.merge(candidate.status);
            merged.processed_inputs = current
                .processed_inputs
                .union(&candidate.processed_inputs)
                .cloned()
                .collect();
            merged.rejected_inputs = current
                .rejected_inputs
                .union(&candidate.rejected_inputs)
                .cloned()
                .collect();
            merged.jobs = current.jobs.max(candidate.jobs);
            merged.version = current.version;
            candidate = merged;
        }
        Err(exhausted_retries("inbox save"))
    }

    async fn update_status(&self, request_name: &str, status: Status) -> WorkQueueResult<()> {
        for _ in 0..DEFAULT_MAX_CONFLICT_RETRIES {
            let current = self
                .get(request_name)
                .await?
                .ok_or_else(|| WorkQueueError::Repo(format!("inbox {request_name} not found")))?;

            let merged_status = current.status.merge(status);
            let mut updated = current.clone();
            updated.status = merged_status;
            updated.update_time = Utc::now();
            let data = serde_json::to_string(&updated).map_err(|e| WorkQueueError::Repo(e.to_string()))?;

            let result = sqlx::query(
                "UPDATE inbox_elements SET status = $1, update_time = $2, version = $3, data = $4 WHERE request_name = $5 AND version = $6",
            )
            .bind(merged_status.to_string())
            .bind(updated.update_time)
            .bind(current.version + 1)
            .bind(data)
            .bind(request_name)
            .bind(current.version)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                return Ok(());
            }
        }
        Err(exhausted_retries("inbox update_status"))
    }

    async fn get(&self, request_name: &str) -> WorkQueueResult<Option<InboxElement>> {
        let row = sqlx::query("SELECT data FROM inbox_elements WHERE request_name = $1")
            .bind(request_name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_inbox).transpose()
    }

    async fn get_all(&self) -> WorkQueueResult<Vec<InboxElement>> {
        let rows = sqlx::query("SELECT data FROM inbox_elements")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_inbox).collect()
    }

    async fn get_open_for_new_data(&self) -> WorkQueueResult<Vec<InboxElement>> {
        let rows = sqlx::query("SELECT data FROM inbox_elements WHERE open_for_new_data = $1")
            .bind(true)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_inbox).collect()
    }

    async fn delete(&self, request_name: &str) -> WorkQueueResult<()> {
        sqlx::query("DELETE FROM inbox_elements WHERE request_name = $1")
            .bind(request_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

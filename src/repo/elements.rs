use crate::error::{WorkQueueError, WorkQueueResult};
use crate::model::{Element, Status};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::any::AnyPool;
use sqlx::Row;
use std::collections::{BTreeMap, BTreeSet};

use super::{exhausted_retries, DEFAULT_MAX_CONFLICT_RETRIES};

/// Query shape for `get`.
#[derive(Debug, Clone, Default)]
pub struct ElementFilter {
    pub status: Option<Status>,
    pub request_name: Option<String>,
    pub element_ids: Option<Vec<String>>,
    pub child_queue_url: Option<Option<String>>,
    pub open_for_new_data: Option<bool>,
}

impl ElementFilter {
    pub fn by_request(request_name: impl Into<String>) -> Self {
        Self {
            request_name: Some(request_name.into()),
            ..Default::default()
        }
    }

    pub fn by_status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait ElementRepo: Send + Sync {
    async fn insert(&self, elements: &[Element]) -> WorkQueueResult<()>;

    /// Whole-document version-checked write with bounded
    /// read-merge-retry-on-conflict.
    async fn save(&self, elements: &[Element]) -> WorkQueueResult<()>;

    /// Field-level patch for the hot `Status` column, merged against the
    /// state-machine partial order rather than overwritten.
    async fn update_status(&self, id: &str, status: Status) -> WorkQueueResult<()>;

    /// Field-level patch for progress fields, taking the max against the
    /// stored value (percent fields are monotonically non-decreasing
    /// within a status).
    async fn update_progress(
        &self,
        id: &str,
        percent_complete: f64,
        percent_success: f64,
    ) -> WorkQueueResult<()>;

    /// Field-level patch recording substrate injection results from
    /// `getWork`.
    async fn update_injection(
        &self,
        id: &str,
        status: Status,
        subscription_id: i64,
        num_of_files_added: u64,
        wmbs_url: String,
    ) -> WorkQueueResult<()>;

    /// Field-level patch used by `pullWork`/`resetWork`/cancellation to
    /// rewrite topology links alongside status.
    async fn update_topology(
        &self,
        id: &str,
        status: Status,
        child_queue_url: Option<String>,
        parent_queue_url: Option<String>,
        wmbs_url: Option<String>,
    ) -> WorkQueueResult<()>;

    async fn update_possible_site(&self, id: &str, sites: &BTreeSet<String>) -> WorkQueueResult<()>;

    async fn get(&self, filter: &ElementFilter) -> WorkQueueResult<Vec<Element>>;

    /// Store-side half of the matcher: elements in
    /// `Available` whose `PossibleSite` intersects `site_keys` and whose
    /// workflow is not excluded. The greedy priority/slot allocation itself
    /// is the matcher's pure computation (`crate::matcher`), not the
    /// store's.
    async fn available_work(
        &self,
        site_keys: &BTreeSet<String>,
        exclude_workflows: &BTreeSet<String>,
    ) -> WorkQueueResult<Vec<Element>>;

    /// Scan for documents whose on-disk state could have been left
    /// inconsistent by a crashed writer between its read and its
    /// compare-and-swap, and re-apply the merge rule. Since `save` already
    /// merges synchronously inside its own retry loop (unlike a
    /// multi-master store that can leave divergent revisions on disk),
    /// this is a no-op safety sweep here rather than a real conflict
    /// resolution pass — documented in `DESIGN.md`.
    async fn fix_conflicts(&self) -> WorkQueueResult<u64>;

    async fn distinct_request_names(&self) -> WorkQueueResult<Vec<String>>;

    /// Deletes every element belonging to `request_name` (used by
    /// `deleteWorkflows`/`deleteCompletedWFElements`).
    async fn delete_by_request(&self, request_name: &str) -> WorkQueueResult<u64>;
}

pub struct SqlxElementRepo {
    pool: AnyPool,
}

impl SqlxElementRepo {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    async fn row_to_element(row: &sqlx::any::AnyRow) -> WorkQueueResult<Element> {
        let data: String = row.try_get("data")?;
        serde_json::from_str(&data).map_err(|e| WorkQueueError::Repo(e.to_string()))
    }
}

#[async_trait]
impl ElementRepo for SqlxElementRepo {
    async fn insert(&self, elements: &[Element]) -> WorkQueueResult<()> {
        for element in elements {
            let data = serde_json::to_string(element).map_err(|e| WorkQueueError::Repo(e.to_string()))?;
            sqlx::query(
                "INSERT INTO elements (id, request_name, task_name, status, priority, child_queue_url, open_for_new_data, insert_time, update_time, version, data) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(&element.id)
            .bind(&element.request_name)
            .bind(&element.task_name)
            .bind(element.status.to_string())
            .bind(element.priority)
            .bind(element.child_queue_url.clone())
            .bind(element.open_for_new_data)
            .bind(element.insert_time)
            .bind(element.update_time)
            .bind(element.version)
            .bind(data)
            .execute(&self.pool)
            .await?;

            self.update_possible_site(&element.id, &element.possible_site)
                .await?;
        }
        Ok(())
    }

    async fn save(&self, elements: &[Element]) -> WorkQueueResult<()> {
        'outer: for element in elements {
            let mut candidate = element.clone();
            for _ in 0..DEFAULT_MAX_CONFLICT_RETRIES {
                candidate.update_time = Utc::now();
                let data = serde_json::to_string(&candidate)
                    .map_err(|e| WorkQueueError::Repo(e.to_string()))?;
                let result = sqlx::query(
                    "UPDATE elements SET request_name = $1, task_name = $2, status = $3, priority = $4, \
                     child_queue_url = $5, open_for_new_data = $6, update_time = $7, version = $8, data = $9 \
                     WHERE id = $10 AND version = $11",
                )
                .bind(&candidate.request_name)
                .bind(&candidate.task_name)
                .bind(candidate.status.to_string())
                .bind(candidate.priority)
                .bind(candidate.child_queue_url.clone())
                .bind(candidate.open_for_new_data)
                .bind(candidate.update_time)
                .bind(candidate.version + 1)
                .bind(data)
                .bind(&candidate.id)
                .bind(candidate.version)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() > 0 {
                    self.update_possible_site(&candidate.id, &candidate.possible_site)
                        .await?;
                    continue 'outer;
                }

                // Lost the race: re-read and merge (status-max,
                // percent-max, collection-union).
                let current = self
                    .get(&ElementFilter {
                        element_ids: Some(vec![candidate.id.clone()]),
                        ..Default::default()
                    })
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| WorkQueueError::Repo(format!("element {} vanished", candidate.id)))?;

                candidate = merge_elements(&current, &candidate);
            }
            return Err(exhausted_retries("save"));
        }
        Ok(())
    }

    async fn update_status(&self, id: &str, status: Status) -> WorkQueueResult<()> {
        for _ in 0..DEFAULT_MAX_CONFLICT_RETRIES {
            let current = self
                .get(&ElementFilter {
                    element_ids: Some(vec![id.to_string()]),
                    ..Default::default()
                })
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| WorkQueueError::Repo(format!("element {id} not found")))?;

            let merged_status = current.status.merge(status);
            let mut updated = current.clone();
            updated.status = merged_status;
            updated.update_time = Utc::now();
            let data = serde_json::to_string(&updated).map_err(|e| WorkQueueError::Repo(e.to_string()))?;

            let result = sqlx::query(
                "UPDATE elements SET status = $1, update_time = $2, version = $3, data = $4 WHERE id = $5 AND version = $6",
            )
            .bind(merged_status.to_string())
            .bind(updated.update_time)
            .bind(current.version + 1)
            .bind(data)
            .bind(id)
            .bind(current.version)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                return Ok(());
            }
        }
        Err(exhausted_retries("update_status"))
    }

    async fn update_progress(
        &self,
        id: &str,
        percent_complete: f64,
        percent_success: f64,
    ) -> WorkQueueResult<()> {
        for _ in 0..DEFAULT_MAX_CONFLICT_RETRIES {
            let current = self
                .get(&ElementFilter {
                    element_ids: Some(vec![id.to_string()]),
                    ..Default::default()
                })
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| WorkQueueError::Repo(format!("element {id} not found")))?;

            let mut updated = current.clone();
            updated.percent_complete = percent_complete.max(current.percent_complete);
            updated.percent_success = percent_success.max(current.percent_success);
            updated.update_time = Utc::now();
            let data = serde_json::to_string(&updated).map_err(|e| WorkQueueError::Repo(e.to_string()))?;

            let result = sqlx::query(
                "UPDATE elements SET update_time = $1, version = $2, data = $3 WHERE id = $4 AND version = $5",
            )
            .bind(updated.update_time)
            .bind(current.version + 1)
            .bind(data)
            .bind(id)
            .bind(current.version)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                return Ok(());
            }
        }
        Err(exhausted_retries("update_progress"))
    }

    async fn update_injection(
        &self,
        id: &str,
        status: Status,
        subscription_id: i64,
        num_of_files_added: u64,
        wmbs_url: String,
    ) -> WorkQueueResult<()> {
        for _ in 0..DEFAULT_MAX_CONFLICT_RETRIES {
            let current = self
                .get(&ElementFilter {
                    element_ids: Some(vec![id.to_string()]),
                    ..Default::default()
                })
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| WorkQueueError::Repo(format!("element {id} not found")))?;

            let mut updated = current.clone();
            updated.status = current.status.merge(status);
            updated.subscription_id = Some(subscription_id);
            updated.num_of_files_added = num_of_files_added;
            updated.wmbs_url = Some(wmbs_url.clone());
            updated.update_time = Utc::now();
            let data = serde_json::to_string(&updated).map_err(|e| WorkQueueError::Repo(e.to_string()))?;

            let result = sqlx::query(
                "UPDATE elements SET status = $1, update_time = $2, version = $3, data = $4 WHERE id = $5 AND version = $6",
            )
            .bind(updated.status.to_string())
            .bind(updated.update_time)
            .bind(current.version + 1)
            .bind(data)
            .bind(id)
            .bind(current.version)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                return Ok(());
            }
        }
        Err(exhausted_retries("update_injection"))
    }

    async fn update_topology(
        &self,
        id: &str,
        status: Status,
        child_queue_url: Option<String>,
        parent_queue_url: Option<String>,
        wmbs_url: Option<String>,
    ) -> WorkQueueResult<()> {
        for _ in 0..DEFAULT_MAX_CONFLICT_RETRIES {
            let current = self
                .get(&ElementFilter {
                    element_ids: Some(vec![id.to_string()]),
                    ..Default::default()
                })
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| WorkQueueError::Repo(format!("element {id} not found")))?;

            let mut updated = current.clone();
            updated.status = current.status.merge(status);
            updated.child_queue_url = child_queue_url.clone();
            updated.parent_queue_url = parent_queue_url.clone();
            updated.wmbs_url = wmbs_url.clone();
            updated.update_time = Utc::now();
            let data = serde_json::to_string(&updated).map_err(|e| WorkQueueError::Repo(e.to_string()))?;

            let result = sqlx::query(
                "UPDATE elements SET status = $1, child_queue_url = $2, update_time = $3, version = $4, data = $5 WHERE id = $6 AND version = $7",
            )
            .bind(updated.status.to_string())
            .bind(updated.child_queue_url.clone())
            .bind(updated.update_time)
            .bind(current.version + 1)
            .bind(data)
            .bind(id)
            .bind(current.version)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                return Ok(());
            }
        }
        Err(exhausted_retries("update_topology"))
    }

    async fn update_possible_site(&self, id: &str, sites: &BTreeSet<String>) -> WorkQueueResult<()> {
        sqlx::query("DELETE FROM elements_possible_site WHERE element_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        for site in sites {
            sqlx::query("INSERT INTO elements_possible_site (element_id, site) VALUES ($1, $2)")
                .bind(id)
                .bind(site)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn get(&self, filter: &ElementFilter) -> WorkQueueResult<Vec<Element>> {
        // `sqlx::Any` doesn't support a fully dynamic query builder the way
        // `cloud-common::repo::RowMeta` does across its two concrete
        // backends, so the handful of filter combinations this store
        // actually needs are enumerated directly.
        let rows = if let Some(ids) = &filter.element_ids {
            let mut out = Vec::new();
            for id in ids {
                let row = sqlx::query("SELECT data FROM elements WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
                if let Some(row) = row {
                    out.push(row);
                }
            }
            out
        } else if let Some(request_name) = &filter.request_name {
            sqlx::query("SELECT data FROM elements WHERE request_name = $1")
                .bind(request_name)
                .fetch_all(&self.pool)
                .await?
        } else if let Some(status) = filter.status {
            sqlx::query("SELECT data FROM elements WHERE status = $1")
                .bind(status.to_string())
                .fetch_all(&self.pool)
                .await?
        } else if let Some(open) = filter.open_for_new_data {
            sqlx::query("SELECT data FROM elements WHERE open_for_new_data = $1")
                .bind(open)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT data FROM elements")
                .fetch_all(&self.pool)
                .await?
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(Self::row_to_element(row).await?);
        }
        Ok(out)
    }

    async fn available_work(
        &self,
        site_keys: &BTreeSet<String>,
        exclude_workflows: &BTreeSet<String>,
    ) -> WorkQueueResult<Vec<Element>> {
        let candidates = self.get(&ElementFilter::by_status(Status::Available)).await?;
        Ok(candidates
            .into_iter()
            .filter(|e| !exclude_workflows.contains(&e.request_name))
            .filter(|e| e.possible_site.iter().any(|s| site_keys.contains(s)))
            .collect())
    }

    async fn fix_conflicts(&self) -> WorkQueueResult<u64> {
        Ok(0)
    }

    async fn delete_by_request(&self, request_name: &str) -> WorkQueueResult<u64> {
        let ids: Vec<String> = self
            .get(&ElementFilter::by_request(request_name.to_string()))
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        for id in &ids {
            sqlx::query("DELETE FROM elements_possible_site WHERE element_id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        let result = sqlx::query("DELETE FROM elements WHERE request_name = $1")
            .bind(request_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn distinct_request_names(&self) -> WorkQueueResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT request_name FROM elements")
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(row.try_get::<String, _>("request_name")?);
        }
        Ok(out)
    }
}

/// Status-max / percent-max / collection-union merge. Applied
/// when a version-checked write loses its race.
pub fn merge_elements(stored: &Element, attempted: &Element) -> Element {
    let mut merged = stored.clone();
    merged.status = stored.status.merge(attempted.status);
    merged.percent_complete = stored.percent_complete.max(attempted.percent_complete);
    merged.percent_success = stored.percent_success.max(attempted.percent_success);
    merged.possible_site = stored
        .possible_site
        .union(&attempted.possible_site)
        .cloned()
        .collect();
    merged.num_of_files_added = stored.num_of_files_added.max(attempted.num_of_files_added);
    if attempted.child_queue_url.is_some() {
        merged.child_queue_url = attempted.child_queue_url.clone();
    }
    if attempted.subscription_id.is_some() {
        merged.subscription_id = attempted.subscription_id;
    }
    merged.update_time = stored.update_time.max(attempted.update_time);
    merged.version = stored.version;
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EndPolicyName, StartPolicyName};
    use std::collections::BTreeMap;

    fn element(status: Status) -> Element {
        let now = Utc::now();
        Element {
            id: "e1".to_string(),
            request_name: "wf".to_string(),
            task_name: "Task1".to_string(),
            status,
            priority: 0,
            inputs: BTreeMap::new(),
            mask: None,
            jobs: 1,
            number_of_events: 0,
            number_of_lumis: 0,
            number_of_files: 0,
            percent_complete: 0.0,
            percent_success: 0.0,
            parent_queue_id: None,
            parent_queue_url: None,
            child_queue_url: None,
            wmbs_url: None,
            subscription_id: None,
            start_policy: StartPolicyName::Block,
            end_policy: EndPolicyName::SingleShot,
            team_name: None,
            open_for_new_data: false,
            timestamp_found_new_data: None,
            num_of_files_added: 0,
            possible_site: BTreeSet::new(),
            location_refresh_time: None,
            update_time: now,
            insert_time: now,
            version: 0,
        }
    }

    #[test]
    fn merge_never_regresses_status() {
        let stored = element(Status::Running);
        let attempted = element(Status::Acquired);
        let merged = merge_elements(&stored, &attempted);
        assert_eq!(merged.status, Status::Running);
    }

    #[test]
    fn merge_takes_percent_max() {
        let mut stored = element(Status::Running);
        stored.percent_complete = 40.0;
        let mut attempted = element(Status::Running);
        attempted.percent_complete = 55.0;
        let merged = merge_elements(&stored, &attempted);
        assert_eq!(merged.percent_complete, 55.0);
    }
}

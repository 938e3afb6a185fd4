//! `getWork`: match available elements against resource offers
//! and inject them into the execution substrate.

use super::Engine;
use crate::error::WorkQueueResult;
use crate::matcher::{match_elements, MatchInput};
use crate::model::{Element, StartPolicyName, Status};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

impl Engine {
    /// `getWork(jobSlots, siteJobCounts, excludeWorkflows)`.
    #[tracing::instrument(skip(self, job_slots, site_job_counts))]
    pub async fn get_work(
        &self,
        job_slots: BTreeMap<String, i64>,
        site_job_counts: BTreeMap<String, BTreeMap<i64, u64>>,
        exclude_workflows: BTreeSet<String>,
        num_elems: usize,
    ) -> WorkQueueResult<Vec<Element>> {
        let site_keys: BTreeSet<String> = job_slots.keys().cloned().collect();
        let candidates = self.elements.available_work(&site_keys, &exclude_workflows).await?;

        let result = match_elements(MatchInput {
            candidates,
            job_slots,
            site_job_counts,
            num_elems,
        });

        let mut injected = Vec::with_capacity(result.matched.len());
        for element in result.matched {
            match self.inject_one(&element).await {
                Ok(updated) => injected.push(updated),
                Err(e) => {
                    // Transient adapter failure: log and skip, retried next
                    // cycle.
                    warn!(request_name = %element.request_name, element_id = %element.id, error = %e, "getWork: skipping element this cycle");
                    let _ = self
                        .journal
                        .record(
                            "getWork",
                            &format!("element {} ({}) skipped: {e}", element.id, element.request_name),
                        )
                        .await;
                }
            }
        }

        Ok(injected)
    }

    async fn inject_one(&self, element: &Element) -> WorkQueueResult<Element> {
        let spec = self.spec_store.load(&self.inbox_spec_url(&element.request_name).await?).await?;
        let task = spec.task(&element.task_name);

        let mut files_to_add = element.number_of_files;
        if matches!(element.start_policy, StartPolicyName::Dataset) {
            if let Some(input_key) = element.inputs.keys().next() {
                let block_names = self.dbs.list_file_blocks(input_key, true).await?;
                let mut total = 0u64;
                for block_name in &block_names {
                    total += self.dbs.get_file_block(block_name, false).await?.files;
                }
                files_to_add = total;
            }
        }

        if let Some(task) = task {
            if task.parent_processing_flag {
                if let Some(input_key) = element.inputs.keys().next() {
                    let with_parents = self.dbs.get_file_block_with_parents(input_key).await?;
                    files_to_add += with_parents.parent_files;
                }
            }
        }

        let block_name = element.inputs.keys().next().cloned().unwrap_or_default();
        let injection = self
            .substrate
            .create_subscription_and_add_files(&block_name, files_to_add)
            .await?;

        self.elements
            .update_injection(
                &element.id,
                Status::Running,
                injection.subscription_id,
                injection.files_added,
                self.tunables.self_url.to_string(),
            )
            .await?;

        let mut updated = element.clone();
        updated.status = Status::Running;
        updated.subscription_id = Some(injection.subscription_id);
        updated.num_of_files_added = injection.files_added;
        updated.wmbs_url = Some(self.tunables.self_url.to_string());
        Ok(updated)
    }

    async fn inbox_spec_url(&self, request_name: &str) -> WorkQueueResult<String> {
        self.inbox
            .get(request_name)
            .await?
            .map(|i| i.spec_url)
            .ok_or_else(|| crate::error::WorkQueueError::NoMatchingElements)
    }
}

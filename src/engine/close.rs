//! `closeWork`: the continuous-split / open-data
//! loop. Global-queue-only.

use super::Engine;
use crate::error::WorkQueueResult;
use crate::policy::resolve_start_policy;
use crate::policy::start::{resubmit_chunks_for, SplitContext, StartPolicy};
use crate::repo::ElementFilter;
use chrono::Utc;
use tracing::warn;

impl Engine {
    /// `closeWork(workflows?)`. When `workflows` is `None`, every inbox
    /// element with `OpenForNewData=true` is considered.
    #[tracing::instrument(skip(self, workflows))]
    pub async fn close_work(&self, workflows: Option<&[String]>) -> WorkQueueResult<usize> {
        let mut closed = 0usize;
        let candidates = self.inbox.get_open_for_new_data().await?;

        for mut inbox in candidates {
            if let Some(allowlist) = workflows {
                if !allowlist.iter().any(|w| w == &inbox.request_name) {
                    continue;
                }
            }

            let spec = match self.spec_store.load(&inbox.spec_url).await {
                Ok(spec) => spec,
                Err(e) => {
                    warn!(request_name = %inbox.request_name, error = %e, "closeWork: spec unavailable, skipping");
                    continue;
                }
            };

            let Some(task) = spec.top_level_tasks().find(|t| t.start_policy.supports_work_addition()) else {
                inbox.open_for_new_data = false;
                self.inbox.save(&inbox).await?;
                closed += 1;
                continue;
            };

            if task.open_running_timeout.is_none() {
                inbox.open_for_new_data = false;
                self.inbox.save(&inbox).await?;
                closed += 1;
                continue;
            }

            let policy = resolve_start_policy(task.start_policy);
            let resubmit_chunks = resubmit_chunks_for(task, &self.tunables);
            let ctx = SplitContext {
                spec: &spec,
                task,
                inbox: &inbox,
                tunables: &self.tunables,
                dbs: self.dbs.as_ref(),
                phedex: self.phedex.as_ref(),
                continuous: true,
                resubmit_chunks: &resubmit_chunks,
            };

            let has_new_data = policy.new_data_available(&ctx).await.unwrap_or(false);

            if has_new_data {
                let result = policy.split(&ctx).await?;
                if !result.elements.is_empty() {
                    self.elements.insert(&result.elements).await?;
                    inbox.jobs += result.elements.iter().map(|e| e.jobs).sum::<u64>();
                }
                for element in &result.elements {
                    for key in element.inputs.keys() {
                        inbox.processed_inputs.insert(key.clone());
                    }
                }
                inbox.rejected_inputs.extend(result.rejected_inputs);
                inbox.timestamp_found_new_data = Some(Utc::now());
                self.inbox.save(&inbox).await?;
                continue;
            }

            let children = self.elements.get(&ElementFilter::by_request(inbox.request_name.clone())).await?;
            let last_child_update = children.iter().map(|e| e.update_time).max();
            let reference_time = match (inbox.timestamp_found_new_data, last_child_update) {
                (Some(a), Some(b)) => a.max(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => inbox.insert_time,
            };

            let timeout = chrono::Duration::seconds(task.open_running_timeout.unwrap_or(0) as i64);
            if Utc::now() - reference_time > timeout {
                inbox.open_for_new_data = false;
                self.inbox.save(&inbox).await?;
                closed += 1;
            }
        }

        Ok(closed)
    }
}

//! `queueWork`: ingest a spec, split it, and write the
//! resulting inbox + child elements.

use super::Engine;
use crate::error::{WorkQueueError, WorkQueueResult};
use crate::model::InboxElement;
use crate::policy::resolve_start_policy;
use crate::policy::start::{resubmit_chunks_for, SplitContext, StartPolicy};
use chrono::Utc;
use tracing::Instrument;

impl Engine {
    /// `queueWork(specUrl, request?, team?)`. `global` selects whether
    /// aggregated input stats are pushed to the request manager after a
    /// successful split (global-queue behavior only).
    #[tracing::instrument(skip(self), fields(request_name = %request))]
    pub async fn queue_work(
        &self,
        spec_url: &str,
        request: &str,
        team: Option<String>,
        global: bool,
    ) -> WorkQueueResult<InboxElement> {
        let spec = self
            .spec_store
            .load(spec_url)
            .instrument(tracing::info_span!("load_spec"))
            .await?;

        Self::verify_spec_identity(request, &spec.name)?;

        let now = Utc::now();
        let mut inbox = match self.inbox.get(request).await? {
            Some(existing) => existing,
            None => {
                let mut created = InboxElement::new(request, spec_url, now);
                created.team_name = team.clone();
                self.inbox.insert(&created).await?;
                created
            }
        };
        if let Some(team) = team {
            inbox.team_name = Some(team);
        }

        let mut all_elements = Vec::new();
        let mut total_events = 0u64;
        let mut total_lumis = 0u64;
        let mut total_files = 0u64;
        let mut split_failed = None;

        for task in spec.top_level_tasks() {
            let policy = resolve_start_policy(task.start_policy);
            let resubmit_chunks = resubmit_chunks_for(task, &self.tunables);
            let ctx = SplitContext {
                spec: &spec,
                task,
                inbox: &inbox,
                tunables: &self.tunables,
                dbs: self.dbs.as_ref(),
                phedex: self.phedex.as_ref(),
                continuous: false,
                resubmit_chunks: &resubmit_chunks,
            };

            match policy.split(&ctx).await {
                Ok(result) => {
                    if result.elements.is_empty() && result.rejected_inputs.is_empty() {
                        split_failed = Some(WorkQueueError::TerminalSplitError {
                            request_name: request.to_string(),
                            reason: format!("task '{}' produced no elements", task.name),
                        });
                        break;
                    }
                    for element in &result.elements {
                        total_events += element.number_of_events;
                        total_lumis += element.number_of_lumis;
                        total_files += element.number_of_files;
                    }
                    inbox.rejected_inputs.extend(result.rejected_inputs);
                    all_elements.extend(result.elements);
                }
                Err(e @ WorkQueueError::TerminalSplitError { .. }) => {
                    split_failed = Some(e);
                    break;
                }
                Err(other) => return Err(other),
            }
        }

        if let Some(err) = split_failed {
            inbox.status = crate::model::Status::Failed;
            self.inbox.save(&inbox).await?;
            self.journal
                .record("queueWork", &format!("workflow '{request}' failed to split: {err}"))
                .await?;
            return Err(err);
        }

        for element in &all_elements {
            for key in element.inputs.keys() {
                inbox.processed_inputs.insert(key.clone());
            }
        }

        inbox.jobs = all_elements.iter().map(|e| e.jobs).sum();
        inbox.status = crate::model::Status::Acquired;
        self.elements.insert(&all_elements).await?;
        self.inbox.save(&inbox).await?;

        if global {
            let stats = crate::adapters::RequestStats {
                total_jobs: inbox.jobs,
                input_events: total_events,
                input_lumis: total_lumis,
                input_num_files: total_files,
            };
            self.request_manager.update_request_stats(request, &stats).await?;
        }

        Ok(inbox)
    }
}

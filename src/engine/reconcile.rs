//! `performSyncAndCancelAction`: fold child progress into
//! parent status via the end-policy reconciler, and react to cancellation.

use super::Engine;
use crate::error::WorkQueueResult;
use crate::model::Status;
use crate::policy::end::single_shot;
use crate::repo::ElementFilter;
use chrono::Utc;
use tracing::warn;

impl Engine {
    /// `performSyncAndCancelAction(skipWMBS)`.
    #[tracing::instrument(skip(self))]
    pub async fn perform_sync_and_cancel_action(&self, skip_wmbs: bool) -> WorkQueueResult<()> {
        let requests = self.elements.distinct_request_names().await?;

        for request_name in requests {
            if let Err(e) = self.reconcile_one(&request_name, skip_wmbs).await {
                warn!(request_name = %request_name, error = %e, "reconcile: workflow skipped this cycle");
            }
        }
        Ok(())
    }

    async fn reconcile_one(&self, request_name: &str, skip_wmbs: bool) -> WorkQueueResult<()> {
        let mut elements = self.elements.get(&ElementFilter::by_request(request_name)).await?;

        if !skip_wmbs {
            let reported = self.substrate.subscription_status().await?;
            for element in elements.iter_mut() {
                if let Some(subscription_id) = element.subscription_id {
                    if let Some(status) = reported.iter().find(|s| s.subscription_id == subscription_id) {
                        element.percent_complete = element.percent_complete.max(status.percent_complete);
                        element.percent_success = element.percent_success.max(status.percent_success);
                    }
                }
            }
            for element in &elements {
                self.elements
                    .update_progress(&element.id, element.percent_complete, element.percent_success)
                    .await?;
            }
        }

        let Some(mut inbox) = self.inbox.get(request_name).await? else {
            return Ok(());
        };

        let outcome = single_shot(&elements, inbox.success_threshold);

        if outcome.status == Status::CancelRequested {
            self.cancel_work(&[request_name.to_string()], self.tunables.parent_queue_url.is_some())
                .await?;
            return Ok(());
        }

        if outcome.status != inbox.status {
            inbox.status = inbox.status.merge(outcome.status);
            self.inbox.save(&inbox).await?;
        }

        let elapsed = Utc::now() - inbox.update_time;
        if elapsed
            > chrono::Duration::from_std(self.tunables.stuck_element_alert_time)
                .unwrap_or(chrono::Duration::MAX)
        {
            warn!(request_name = %request_name, "reconcile: inbox element stuck past alert threshold");
            self.journal
                .record(
                    "performSyncAndCancelAction",
                    &format!("workflow '{request_name}' has not updated in over the alert threshold"),
                )
                .await?;
        }

        Ok(())
    }
}

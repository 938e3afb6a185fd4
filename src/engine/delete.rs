//! `deleteWorkflows`/`deleteCompletedWFElements`.

use super::Engine;
use crate::adapters::is_archival_eligible;
use crate::error::WorkQueueResult;

impl Engine {
    /// `deleteWorkflows(requests…)`: deletes inbox+children for requests
    /// whose inbox element is in an end state.
    #[tracing::instrument(skip(self))]
    pub async fn delete_workflows(&self, requests: &[String]) -> WorkQueueResult<usize> {
        let mut deleted = 0usize;
        for request_name in requests {
            let Some(inbox) = self.inbox.get(request_name).await? else {
                continue;
            };
            if !inbox.status.is_end_state() {
                continue;
            }
            self.delete_one(request_name).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// `deleteCompletedWFElements()`: additionally consults the request
    /// manager's archival status for every end-state inbox.
    #[tracing::instrument(skip(self))]
    pub async fn delete_completed_wf_elements(&self) -> WorkQueueResult<usize> {
        let all_inboxes = self.inbox.get_all().await?;
        let end_state_requests: Vec<String> = all_inboxes
            .iter()
            .filter(|i| i.status.is_end_state())
            .map(|i| i.request_name.clone())
            .collect();

        if end_state_requests.is_empty() {
            return Ok(0);
        }

        let statuses = self.request_manager.get_request_status(&end_state_requests).await?;

        let mut deleted = 0usize;
        for request_name in end_state_requests {
            let status = statuses.get(&request_name).map(|s| s.as_str());
            if is_archival_eligible(status) {
                self.delete_one(&request_name).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn delete_one(&self, request_name: &str) -> WorkQueueResult<()> {
        self.elements.delete_by_request(request_name).await?;
        self.inbox.delete(request_name).await?;
        Ok(())
    }
}

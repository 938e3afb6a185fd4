//! `cancelWork`.

use super::Engine;
use crate::error::WorkQueueResult;
use crate::model::Status;
use crate::repo::ElementFilter;
use chrono::Utc;
use tracing::warn;

impl Engine {
    /// `cancelWork(requests…)`. `local` selects the local-queue path
    /// (kill the substrate subscription, cancel inbox directly) versus the
    /// global-queue path (fast-path cancellation per element, propagate
    /// `CancelRequested` to children).
    #[tracing::instrument(skip(self))]
    pub async fn cancel_work(&self, requests: &[String], local: bool) -> WorkQueueResult<()> {
        for request_name in requests {
            if local {
                if let Err(e) = self.substrate.kill_workflow(request_name).await {
                    warn!(request_name = %request_name, error = %e, "cancelWork: substrate kill failed, retrying next cycle");
                }
            }

            let mut elements = self.elements.get(&ElementFilter::by_request(request_name.clone())).await?;
            for element in elements.iter_mut() {
                if element.status.is_end_state() {
                    continue;
                }
                element.request_cancel();
                self.elements.update_status(&element.id, element.status).await?;
            }

            if let Some(mut inbox) = self.inbox.get(request_name).await? {
                if !inbox.status.is_end_state() {
                    inbox.status = if local {
                        Status::Canceled
                    } else {
                        Status::CancelRequested
                    };
                    self.inbox.save(&inbox).await?;
                }
            }

            self.force_finalize_if_grace_expired(request_name).await?;
        }
        Ok(())
    }

    /// Abandon-dead-agent: if the most recently updated element for this
    /// workflow predates `cancelGraceTime`, unilaterally finalize everything
    /// still outstanding to `Canceled`.
    async fn force_finalize_if_grace_expired(&self, request_name: &str) -> WorkQueueResult<()> {
        let elements = self.elements.get(&ElementFilter::by_request(request_name.to_string())).await?;
        let Some(last_update) = elements.iter().map(|e| e.update_time).max() else {
            return Ok(());
        };

        let grace = chrono::Duration::from_std(self.tunables.cancel_grace_time)
            .unwrap_or(chrono::Duration::MAX);
        if Utc::now() - last_update <= grace {
            return Ok(());
        }

        for element in &elements {
            if !element.status.is_end_state() {
                self.elements.update_status(&element.id, Status::Canceled).await?;
            }
        }
        if let Some(mut inbox) = self.inbox.get(request_name).await? {
            if !inbox.status.is_end_state() {
                inbox.status = Status::Canceled;
                self.inbox.save(&inbox).await?;
            }
        }
        self.journal
            .record(
                "cancelWork",
                &format!("workflow '{request_name}' force-finalized after cancelGraceTime elapsed"),
            )
            .await?;
        Ok(())
    }
}

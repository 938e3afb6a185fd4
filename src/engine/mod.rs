//! Queue engine: binds the backend store, policies, matcher,
//! location mapper, and adapters together into the queue's operational
//! and administrative RPCs.

pub mod cancel;
pub mod close;
pub mod delete;
pub mod ingest;
pub mod inject;
pub mod pull;
pub mod reconcile;

use crate::adapters::{
    DbsAdapter, ParentQueueClient, PhedexAdapter, RequestManagerAdapter, SiteDbAdapter, SpecStore,
    SubstrateAdapter,
};
use crate::config::QueueTunables;
use crate::error::{WorkQueueError, WorkQueueResult};
use crate::model::{Element, Status};
use crate::repo::{ElementFilter, ElementRepo, InboxRepo, JournalRepo};
use std::sync::Arc;

/// Everything the queue engine's operations need. Held behind
/// `Arc<dyn Trait>` seams so mock adapters can be swapped in for tests
/// without touching engine code.
pub struct Engine {
    pub elements: Arc<dyn ElementRepo>,
    pub inbox: Arc<dyn InboxRepo>,
    pub journal: Arc<dyn JournalRepo>,
    pub dbs: Arc<dyn DbsAdapter>,
    pub phedex: Arc<dyn PhedexAdapter>,
    pub sitedb: Arc<dyn SiteDbAdapter>,
    pub substrate: Arc<dyn SubstrateAdapter>,
    pub request_manager: Arc<dyn RequestManagerAdapter>,
    pub spec_store: Arc<dyn SpecStore>,
    /// `None` for a global queue (which has no parent); required for a
    /// local queue's `pullWork`.
    pub parent_client: Option<Arc<dyn ParentQueueClient>>,
    pub tunables: QueueTunables,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        elements: Arc<dyn ElementRepo>,
        inbox: Arc<dyn InboxRepo>,
        journal: Arc<dyn JournalRepo>,
        dbs: Arc<dyn DbsAdapter>,
        phedex: Arc<dyn PhedexAdapter>,
        sitedb: Arc<dyn SiteDbAdapter>,
        substrate: Arc<dyn SubstrateAdapter>,
        request_manager: Arc<dyn RequestManagerAdapter>,
        spec_store: Arc<dyn SpecStore>,
        parent_client: Option<Arc<dyn ParentQueueClient>>,
        tunables: QueueTunables,
    ) -> Self {
        Self {
            elements,
            inbox,
            journal,
            dbs,
            phedex,
            sitedb,
            substrate,
            request_manager,
            spec_store,
            parent_client,
            tunables,
        }
    }

    /// `setPriority(new, workflows…)`: field-level update on
    /// all elements for those workflows; no state change.
    pub async fn set_priority(&self, new_priority: i64, workflows: &[String]) -> WorkQueueResult<()> {
        for workflow in workflows {
            let elements = self
                .elements
                .get(&ElementFilter::by_request(workflow.clone()))
                .await?;
            for element in elements {
                let mut updated = element.clone();
                updated.priority = new_priority;
                self.elements.save(std::slice::from_ref(&updated)).await?;
            }
        }
        Ok(())
    }

    /// `resetWork(ids)`: non-terminal →
    /// `Available`, `ChildQueueUrl=∅`, `WMBSUrl=∅`. The subscription id is
    /// recorded to the audit journal before being cleared from the live
    /// element, per scenario S6 ("retained only in audit, not on the
    /// element").
    pub async fn reset_work(&self, ids: &[String]) -> WorkQueueResult<()> {
        let elements = self
            .elements
            .get(&ElementFilter {
                element_ids: Some(ids.to_vec()),
                ..Default::default()
            })
            .await?;

        for element in elements {
            if element.status.is_end_state() {
                continue;
            }

            if let Some(subscription_id) = element.subscription_id {
                self.journal
                    .record(
                        "resetWork",
                        &format!(
                            "element {} reset; subscription {} retained in audit only",
                            element.id, subscription_id
                        ),
                    )
                    .await?;
            }

            let mut reset = element.clone();
            reset.reset();
            self.elements.save(std::slice::from_ref(&reset)).await?;
        }
        Ok(())
    }

    /// `doneWork(ids)`: operator-driven force-completion, field-level
    /// status update merged against the partial order like any other hot
    /// field write.
    pub async fn done_work(&self, ids: &[String]) -> WorkQueueResult<()> {
        for id in ids {
            self.elements.update_status(id, Status::Done).await?;
        }
        Ok(())
    }

    pub async fn status(&self, filter: &ElementFilter) -> WorkQueueResult<Vec<Element>> {
        self.elements.get(filter).await
    }

    pub async fn status_inbox(&self, request_name: &str) -> WorkQueueResult<Option<crate::model::InboxElement>> {
        self.inbox.get(request_name).await
    }

    /// `setStatus(status, ids…)`: administrative override, same
    /// merge-on-write path as any hot-field update.
    pub async fn set_status(&self, status: Status, ids: &[String]) -> WorkQueueResult<()> {
        for id in ids {
            self.elements.update_status(id, status).await?;
        }
        Ok(())
    }

    pub(crate) fn verify_spec_identity(request: &str, spec_name: &str) -> WorkQueueResult<()> {
        if request != spec_name {
            return Err(WorkQueueError::WMSpecError {
                request: request.to_string(),
                spec_name: spec_name.to_string(),
            });
        }
        Ok(())
    }
}

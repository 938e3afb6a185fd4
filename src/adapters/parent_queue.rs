//! Parent-queue replication client. A local queue's engine talks to its parent through this
//! seam rather than holding a direct `Arc<dyn ElementRepo>` to it, since the
//! parent is ordinarily a separate queue instance reached over the wire.

use crate::error::WorkQueueResult;
use crate::model::Element;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::repo::ElementRepo;

/// What a local queue needs from its parent to replicate work down.
#[async_trait]
pub trait ParentQueueClient: Send + Sync {
    /// Store-side filter: `Available` elements whose
    /// `PossibleSite` intersects `site_keys`, excluding `exclude_workflows`.
    async fn available_work(
        &self,
        site_keys: &BTreeSet<String>,
        exclude_workflows: &BTreeSet<String>,
    ) -> WorkQueueResult<Vec<Element>>;

    /// Version-checked whole-document save on the parent's copy.
    async fn save(&self, elements: &[Element]) -> WorkQueueResult<()>;
}

/// Same-process parent, used when both tiers share one deployment (tests,
/// single-box dev) — talks directly to the parent's `ElementRepo` rather
/// than over HTTP.
pub struct InProcessParentQueueClient {
    parent_elements: Arc<dyn ElementRepo>,
}

impl InProcessParentQueueClient {
    pub fn new(parent_elements: Arc<dyn ElementRepo>) -> Self {
        Self { parent_elements }
    }
}

#[async_trait]
impl ParentQueueClient for InProcessParentQueueClient {
    async fn available_work(
        &self,
        site_keys: &BTreeSet<String>,
        exclude_workflows: &BTreeSet<String>,
    ) -> WorkQueueResult<Vec<Element>> {
        self.parent_elements
            .available_work(site_keys, exclude_workflows)
            .await
    }

    async fn save(&self, elements: &[Element]) -> WorkQueueResult<()> {
        self.parent_elements.save(elements).await
    }
}

/// Real deployment: the parent is a different queue instance, reached over
/// its internal replication endpoints (distinct from the operator-facing
/// REST surface — see `api::replication`).
pub struct HttpParentQueueClient {
    http: reqwest::Client,
    parent_url: url::Url,
}

impl HttpParentQueueClient {
    pub fn new(parent_url: url::Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            parent_url,
        }
    }
}

#[async_trait]
impl ParentQueueClient for HttpParentQueueClient {
    async fn available_work(
        &self,
        site_keys: &BTreeSet<String>,
        exclude_workflows: &BTreeSet<String>,
    ) -> WorkQueueResult<Vec<Element>> {
        #[derive(serde::Serialize)]
        struct Request<'a> {
            site_keys: &'a BTreeSet<String>,
            exclude_workflows: &'a BTreeSet<String>,
        }

        let url = self
            .parent_url
            .join("internal/replication/available-work")
            .map_err(|e| crate::error::WorkQueueError::Generic(e.to_string()))?;

        let response = self
            .http
            .post(url)
            .json(&Request {
                site_keys,
                exclude_workflows,
            })
            .send()
            .await
            .map_err(|e| crate::error::WorkQueueError::TransientAdapterError {
                adapter: "parent_queue",
                target: self.parent_url.to_string(),
                reason: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| crate::error::WorkQueueError::TransientAdapterError {
                adapter: "parent_queue",
                target: self.parent_url.to_string(),
                reason: e.to_string(),
            })?;

        response
            .json::<Vec<Element>>()
            .await
            .map_err(|e| crate::error::WorkQueueError::Repo(e.to_string()))
    }

    async fn save(&self, elements: &[Element]) -> WorkQueueResult<()> {
        let url = self
            .parent_url
            .join("internal/replication/save")
            .map_err(|e| crate::error::WorkQueueError::Generic(e.to_string()))?;

        self.http
            .post(url)
            .json(elements)
            .send()
            .await
            .map_err(|e| crate::error::WorkQueueError::TransientAdapterError {
                adapter: "parent_queue",
                target: self.parent_url.to_string(),
                reason: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| crate::error::WorkQueueError::TransientAdapterError {
                adapter: "parent_queue",
                target: self.parent_url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

//! Internal replication endpoints that a child queue's
//! `adapters::HttpParentQueueClient` talks to. Distinct
//! from the operator-facing `/v1/queue` surface — no tag overlap, separate
//! prefix, meant to be reached only by sibling queue instances.

use std::collections::BTreeSet;
use std::sync::Arc;

use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};

use crate::api::{ApiResult, ApiTags};
use crate::engine::Engine;
use crate::model::Element;

pub struct ReplicationApi {
    pub engine: Arc<Engine>,
}

#[derive(Debug, Clone, Object)]
pub struct AvailableWorkRequest {
    pub site_keys: Vec<String>,
    #[oai(default)]
    pub exclude_workflows: Vec<String>,
}

#[derive(Debug, Clone, Object)]
pub struct SaveRequest {
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, Object)]
pub struct SaveResponse {}

#[OpenApi(prefix_path = "/internal/replication", tag = ApiTags::Replication)]
impl ReplicationApi {
    /// Store-side filter a child pulls through on `pullWork`: `Available`
    /// elements whose `PossibleSite` intersects the caller's sites.
    #[oai(path = "/available-work", method = "post", operation_id = "available_work")]
    async fn available_work(
        &self,
        body: Json<AvailableWorkRequest>,
    ) -> ApiResult<Json<Vec<Element>>> {
        let req = body.0;
        let site_keys: BTreeSet<String> = req.site_keys.into_iter().collect();
        let exclude_workflows: BTreeSet<String> = req.exclude_workflows.into_iter().collect();

        let elements = self
            .engine
            .elements
            .available_work(&site_keys, &exclude_workflows)
            .await?;
        Ok(Json(elements))
    }

    /// Version-checked whole-document save pushed up from a child queue
    /// after it forks local copies of the pulled elements.
    #[oai(path = "/save", method = "post", operation_id = "save")]
    async fn save(&self, body: Json<SaveRequest>) -> ApiResult<Json<SaveResponse>> {
        self.engine.elements.save(&body.0.elements).await?;
        Ok(Json(SaveResponse {}))
    }
}

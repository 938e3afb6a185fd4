//! Operator-facing queue RPCs:
//! `queueWork`, `pullWork`, `getWork`, `status`, `statusInbox`, `setStatus`,
//! `setPriority`, `resetWork`, `cancelWork`, `doneWork`, `closeWork`,
//! `deleteWorkflows`, `performQueueCleanupActions`, `monitorWorkQueue`.

use crate::api::{ApiResult, ApiTags};
use crate::engine::Engine;
use crate::model::{Element, InboxElement, Status};
use crate::repo::ElementFilter;
use poem_openapi::param::{Path, Query};
use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

pub struct QueueApi {
    pub engine: Arc<Engine>,
}

#[derive(Debug, Clone, Object)]
pub struct QueueWorkRequest {
    pub spec_url: String,
    pub request: String,
    pub team: Option<String>,
    #[oai(default)]
    pub global: bool,
}

#[derive(Debug, Clone, Object)]
pub struct PullWorkRequest {
    pub job_slots: Option<HashMap<String, u64>>,
    pub site_job_counts: Option<HashMap<String, HashMap<String, u64>>>,
}

#[derive(Debug, Clone, Object)]
pub struct PullWorkResponse {
    pub pulled: u64,
}

#[derive(Debug, Clone, Object)]
pub struct GetWorkRequest {
    pub job_slots: HashMap<String, i64>,
    #[oai(default)]
    pub site_job_counts: HashMap<String, HashMap<String, u64>>,
    #[oai(default)]
    pub exclude_workflows: Vec<String>,
    pub num_elems: u64,
}

#[derive(Debug, Clone, Object)]
pub struct SetPriorityRequest {
    pub new_priority: i64,
    pub workflows: Vec<String>,
}

#[derive(Debug, Clone, Object)]
pub struct IdsRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Object)]
pub struct CancelRequest {
    pub requests: Vec<String>,
    #[oai(default)]
    pub local: bool,
}

#[derive(Debug, Clone, Object)]
pub struct CloseRequest {
    pub workflows: Option<Vec<String>>,
}

#[derive(Debug, Clone, Object)]
pub struct CloseResponse {
    pub closed: u64,
}

#[derive(Debug, Clone, Object)]
pub struct DeleteRequest {
    pub requests: Vec<String>,
}

#[derive(Debug, Clone, Object)]
pub struct DeleteResponse {
    pub deleted: u64,
}

#[derive(Debug, Clone, Object)]
pub struct CleanupResponse {
    pub deleted: u64,
}

#[derive(Debug, Clone, Object)]
pub struct MonitorResponse {
    pub elements_by_status: HashMap<String, u64>,
    pub inbox_by_status: HashMap<String, u64>,
    pub total_elements: u64,
    pub total_inbox: u64,
}

#[derive(Debug, Clone, Object)]
pub struct EmptyResponse {}

fn parse_priority_map(
    input: HashMap<String, HashMap<String, u64>>,
) -> BTreeMap<String, BTreeMap<i64, u64>> {
    input
        .into_iter()
        .map(|(site, by_priority)| {
            let parsed = by_priority
                .into_iter()
                .filter_map(|(priority, jobs)| priority.parse::<i64>().ok().map(|p| (p, jobs)))
                .collect();
            (site, parsed)
        })
        .collect()
}

#[OpenApi(prefix_path = "/v1/queue", tag = ApiTags::Queue)]
impl QueueApi {
    /// `queueWork(specUrl, request?, team?)`.
    #[oai(path = "/work", method = "post", operation_id = "queue_work")]
    async fn queue_work(&self, body: Json<QueueWorkRequest>) -> ApiResult<Json<InboxElement>> {
        let req = body.0;
        let inbox = self
            .engine
            .queue_work(&req.spec_url, &req.request, req.team, req.global)
            .await?;
        Ok(Json(inbox))
    }

    /// `pullWork(resources?)` — local-queue-only.
    #[oai(path = "/pull", method = "post", operation_id = "pull_work")]
    async fn pull_work(&self, body: Json<PullWorkRequest>) -> ApiResult<Json<PullWorkResponse>> {
        let req = body.0;
        let resources = match (req.job_slots, req.site_job_counts) {
            (Some(slots), counts) => Some((slots, parse_priority_map(counts.unwrap_or_default()))),
            (None, _) => None,
        };
        let pulled = self.engine.pull_work(resources).await?;
        Ok(Json(PullWorkResponse {
            pulled: pulled as u64,
        }))
    }

    /// `getWork(jobSlots, siteJobCounts, excludeWorkflows)`.
    #[oai(path = "/get-work", method = "post", operation_id = "get_work")]
    async fn get_work(&self, body: Json<GetWorkRequest>) -> ApiResult<Json<Vec<Element>>> {
        let req = body.0;
        let job_slots: BTreeMap<String, i64> = req.job_slots.into_iter().collect();
        let site_job_counts = parse_priority_map(req.site_job_counts);
        let exclude_workflows: BTreeSet<String> = req.exclude_workflows.into_iter().collect();

        let injected = self
            .engine
            .get_work(job_slots, site_job_counts, exclude_workflows, req.num_elems as usize)
            .await?;
        Ok(Json(injected))
    }

    /// `status(filter?)`: query by request name and/or element status.
    #[oai(path = "/status", method = "get", operation_id = "status")]
    async fn status(
        &self,
        request_name: Query<Option<String>>,
        status: Query<Option<Status>>,
    ) -> ApiResult<Json<Vec<Element>>> {
        let filter = ElementFilter {
            request_name: request_name.0,
            status: status.0,
            ..Default::default()
        };
        let elements = self.engine.status(&filter).await?;
        Ok(Json(elements))
    }

    /// `statusInbox(requestName)`.
    #[oai(path = "/inbox", method = "get", operation_id = "status_inbox")]
    async fn status_inbox(&self, request_name: Query<String>) -> ApiResult<Json<InboxElement>> {
        match self.engine.status_inbox(&request_name.0).await? {
            Some(inbox) => Ok(Json(inbox)),
            None => Err(crate::api::ApiError::NotFound(Json(crate::api::ErrorBody {
                error: format!("no inbox element for '{}'", request_name.0),
            }))),
        }
    }

    /// `setStatus(status, ids…)`.
    #[oai(path = "/status/:status", method = "post", operation_id = "set_status")]
    async fn set_status(&self, status: Path<Status>, body: Json<IdsRequest>) -> ApiResult<Json<EmptyResponse>> {
        self.engine.set_status(status.0, &body.0.ids).await?;
        Ok(Json(EmptyResponse {}))
    }

    /// `setPriority(new, workflows…)`.
    #[oai(path = "/priority", method = "post", operation_id = "set_priority")]
    async fn set_priority(&self, body: Json<SetPriorityRequest>) -> ApiResult<Json<EmptyResponse>> {
        let req = body.0;
        self.engine.set_priority(req.new_priority, &req.workflows).await?;
        Ok(Json(EmptyResponse {}))
    }

    /// `resetWork(ids)`.
    #[oai(path = "/reset", method = "post", operation_id = "reset_work")]
    async fn reset_work(&self, body: Json<IdsRequest>) -> ApiResult<Json<EmptyResponse>> {
        self.engine.reset_work(&body.0.ids).await?;
        Ok(Json(EmptyResponse {}))
    }

    /// `cancelWork(requests…)`.
    #[oai(path = "/cancel", method = "post", operation_id = "cancel_work")]
    async fn cancel_work(&self, body: Json<CancelRequest>) -> ApiResult<Json<EmptyResponse>> {
        let req = body.0;
        self.engine.cancel_work(&req.requests, req.local).await?;
        Ok(Json(EmptyResponse {}))
    }

    /// `doneWork(ids)`.
    #[oai(path = "/done", method = "post", operation_id = "done_work")]
    async fn done_work(&self, body: Json<IdsRequest>) -> ApiResult<Json<EmptyResponse>> {
        self.engine.done_work(&body.0.ids).await?;
        Ok(Json(EmptyResponse {}))
    }

    /// `closeWork(workflows?)` — global-queue-only.
    #[oai(path = "/close", method = "post", operation_id = "close_work")]
    async fn close_work(&self, body: Json<CloseRequest>) -> ApiResult<Json<CloseResponse>> {
        let workflows = body.0.workflows;
        let closed = self.engine.close_work(workflows.as_deref()).await?;
        Ok(Json(CloseResponse { closed: closed as u64 }))
    }

    /// `deleteWorkflows(requests…)`.
    #[oai(path = "/delete", method = "post", operation_id = "delete_workflows")]
    async fn delete_workflows(&self, body: Json<DeleteRequest>) -> ApiResult<Json<DeleteResponse>> {
        let deleted = self.engine.delete_workflows(&body.0.requests).await?;
        Ok(Json(DeleteResponse {
            deleted: deleted as u64,
        }))
    }

    /// `performQueueCleanupActions()`: archival-driven deletion sweep.
    #[oai(path = "/cleanup", method = "post", operation_id = "cleanup")]
    async fn cleanup(&self) -> ApiResult<Json<CleanupResponse>> {
        let deleted = self.engine.delete_completed_wf_elements().await?;
        Ok(Json(CleanupResponse {
            deleted: deleted as u64,
        }))
    }

    /// `monitorWorkQueue()`: aggregate counts by status, for dashboards.
    #[oai(path = "/monitor", method = "get", operation_id = "monitor")]
    async fn monitor(&self) -> ApiResult<Json<MonitorResponse>> {
        let elements = self.engine.status(&ElementFilter::default()).await?;
        let mut elements_by_status: HashMap<String, u64> = HashMap::new();
        for element in &elements {
            *elements_by_status.entry(element.status.to_string()).or_insert(0) += 1;
        }

        let inboxes = self.engine.inbox.get_all().await?;
        let mut inbox_by_status: HashMap<String, u64> = HashMap::new();
        for inbox in &inboxes {
            *inbox_by_status.entry(inbox.status.to_string()).or_insert(0) += 1;
        }

        Ok(Json(MonitorResponse {
            total_elements: elements.len() as u64,
            total_inbox: inboxes.len() as u64,
            elements_by_status,
            inbox_by_status,
        }))
    }
}

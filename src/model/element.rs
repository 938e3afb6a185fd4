use super::mask::Mask;
use super::spec::{EndPolicyName, StartPolicyName};
use super::status::Status;
use chrono::{DateTime, Utc};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The unit of queued work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    pub request_name: String,
    pub task_name: String,
    pub status: Status,
    pub priority: i64,

    /// Input key (dataset or block name) → replica site list. Empty for
    /// MonteCarlo.
    pub inputs: BTreeMap<String, Vec<String>>,
    pub mask: Option<Mask>,

    pub jobs: u64,
    pub number_of_events: u64,
    pub number_of_lumis: u64,
    pub number_of_files: u64,

    pub percent_complete: f64,
    pub percent_success: f64,

    pub parent_queue_id: Option<String>,
    pub parent_queue_url: Option<String>,
    pub child_queue_url: Option<String>,
    pub wmbs_url: Option<String>,
    pub subscription_id: Option<i64>,

    pub start_policy: StartPolicyName,
    pub end_policy: EndPolicyName,
    pub team_name: Option<String>,

    pub open_for_new_data: bool,
    pub timestamp_found_new_data: Option<DateTime<Utc>>,
    pub num_of_files_added: u64,

    /// Eligible-site set, refreshed by the location mapper.
    pub possible_site: BTreeSet<String>,
    /// Last time the location mapper refreshed `possible_site` for this
    /// element; drives the `LocationRefreshInterval`/
    /// `FullLocationRefreshInterval` cadence.
    pub location_refresh_time: Option<DateTime<Utc>>,

    pub update_time: DateTime<Utc>,
    pub insert_time: DateTime<Utc>,

    /// Optimistic-concurrency version token.
    pub version: i64,
}

impl Element {
    /// `reset(id)` — invariant: non-terminal → `Available`, clearing
    /// `ChildQueueUrl`/`WMBSUrl`.
    ///
    /// `SubscriptionId` is intentionally left untouched on the element in
    /// the in-memory model — scenario S6 requires it survive only in the
    /// audit trail, not as a live field, so the engine clears it on the
    /// persisted row via `record_task_activity` + a field-level update that
    /// nulls `subscription_id` alongside `child_queue_url`/`wmbs_url`; see
    /// `engine::reset`.
    pub fn reset(&mut self) {
        self.status = Status::Available;
        self.child_queue_url = None;
        self.wmbs_url = None;
        self.subscription_id = None;
    }

    /// Cancellation fast-path: no child →
    /// `Canceled` directly; otherwise → `CancelRequested`.
    pub fn request_cancel(&mut self) {
        if self.child_queue_url.is_none() {
            self.status = Status::Canceled;
        } else {
            self.status = Status::CancelRequested;
        }
    }

    pub fn is_open_for_matching(&self) -> bool {
        self.status == Status::Available
    }
}

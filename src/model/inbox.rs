use super::spec::EndPolicyName;
use super::status::Status;
use chrono::{DateTime, Utc};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The top-level envelope created when a spec arrives; exactly one per
/// workflow per queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct InboxElement {
    pub request_name: String,
    pub spec_url: String,
    pub team_name: Option<String>,
    pub status: Status,
    pub priority: i64,

    /// Total `Jobs` across this workflow's split elements, once split
    /// (invariant 2, 3).
    pub jobs: u64,

    pub end_policy: EndPolicyName,
    pub success_threshold: f64,

    /// Continuous-split ledger.
    pub processed_inputs: BTreeSet<String>,
    pub rejected_inputs: BTreeSet<String>,
    pub open_for_new_data: bool,
    pub timestamp_found_new_data: Option<DateTime<Utc>>,

    pub update_time: DateTime<Utc>,
    pub insert_time: DateTime<Utc>,

    pub version: i64,
}

impl InboxElement {
    pub fn new(request_name: impl Into<String>, spec_url: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            request_name: request_name.into(),
            spec_url: spec_url.into(),
            team_name: None,
            status: Status::Negotiating,
            priority: 0,
            jobs: 0,
            end_policy: EndPolicyName::SingleShot,
            success_threshold: 0.9,
            processed_inputs: BTreeSet::new(),
            rejected_inputs: BTreeSet::new(),
            open_for_new_data: true,
            timestamp_found_new_data: None,
            update_time: now,
            insert_time: now,
            version: 0,
        }
    }
}

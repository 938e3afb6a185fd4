use crate::error::WorkQueueResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Aggregated input statistics pushed on global-queue ingest.
#[derive(Debug, Clone, Default)]
pub struct RequestStats {
    pub total_jobs: u64,
    pub input_events: u64,
    pub input_lumis: u64,
    pub input_num_files: u64,
}

/// Archival request-record statuses that make a workflow eligible for
/// `deleteCompletedWFElements`.
pub const ARCHIVAL_STATUSES: &[&str] = &[
    "completed",
    "closed-out",
    "failed",
    "announced",
    "aborted-completed",
    "rejected",
    "normal-archived",
    "aborted-archived",
    "rejected-archived",
];

#[async_trait]
pub trait RequestManagerAdapter: Send + Sync {
    async fn update_request_stats(&self, request_name: &str, stats: &RequestStats) -> WorkQueueResult<()>;

    /// `getRequestByNames(names) -> {name: RequestStatus}`. Names absent
    /// from the result are treated as archival-eligible are eligible").
    async fn get_request_status(&self, names: &[String]) -> WorkQueueResult<BTreeMap<String, String>>;
}

pub struct MockRequestManagerAdapter {
    statuses: Mutex<BTreeMap<String, String>>,
    stats: Mutex<BTreeMap<String, RequestStats>>,
}

impl MockRequestManagerAdapter {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(BTreeMap::new()),
            stats: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_status(self, name: impl Into<String>, status: impl Into<String>) -> Self {
        self.statuses.lock().unwrap().insert(name.into(), status.into());
        self
    }

    pub fn recorded_stats(&self, name: &str) -> Option<RequestStats> {
        self.stats.lock().unwrap().get(name).cloned()
    }
}

impl Default for MockRequestManagerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestManagerAdapter for MockRequestManagerAdapter {
    async fn update_request_stats(&self, request_name: &str, stats: &RequestStats) -> WorkQueueResult<()> {
        self.stats
            .lock()
            .unwrap()
            .insert(request_name.to_string(), stats.clone());
        Ok(())
    }

    async fn get_request_status(&self, names: &[String]) -> WorkQueueResult<BTreeMap<String, String>> {
        let guard = self.statuses.lock().unwrap();
        Ok(names
            .iter()
            .filter_map(|n| guard.get(n).map(|s| (n.clone(), s.clone())))
            .collect())
    }
}

pub fn is_archival_eligible(status: Option<&str>) -> bool {
    match status {
        None => true,
        Some(s) => ARCHIVAL_STATUSES.contains(&s),
    }
}

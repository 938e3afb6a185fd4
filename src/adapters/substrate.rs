use crate::error::WorkQueueResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// Result of `createSubscriptionAndAddFiles`.
#[derive(Debug, Clone)]
pub struct InjectionResult {
    pub subscription_id: i64,
    pub files_added: u64,
}

/// One row of `wmbsSubscriptionStatus()`.
#[derive(Debug, Clone)]
pub struct SubstrateStatus {
    pub subscription_id: i64,
    pub percent_complete: f64,
    pub percent_success: f64,
    pub running_jobs: u64,
}

/// Local-queue-only execution-substrate adapter.
#[async_trait]
pub trait SubstrateAdapter: Send + Sync {
    async fn create_subscription_and_add_files(
        &self,
        block_name: &str,
        files: u64,
    ) -> WorkQueueResult<InjectionResult>;

    async fn kill_workflow(&self, request_name: &str) -> WorkQueueResult<()>;

    async fn subscription_status(&self) -> WorkQueueResult<Vec<SubstrateStatus>>;

    /// `freeSlots(depth, knownSites)` — (site → free slots, site → (prio →
    /// jobs already queued at that priority or higher)).
    async fn free_slots(
        &self,
        known_sites: &[String],
    ) -> WorkQueueResult<(BTreeMap<String, u64>, BTreeMap<String, BTreeMap<i64, u64>>)>;
}

pub struct MockSubstrateAdapter {
    next_subscription_id: AtomicI64,
    slots: Mutex<BTreeMap<String, u64>>,
    killed: Mutex<Vec<String>>,
}

impl MockSubstrateAdapter {
    pub fn new() -> Self {
        Self {
            next_subscription_id: AtomicI64::new(1),
            slots: Mutex::new(BTreeMap::new()),
            killed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_slots(self, site: impl Into<String>, slots: u64) -> Self {
        self.slots.lock().unwrap().insert(site.into(), slots);
        self
    }

    pub fn killed_workflows(&self) -> Vec<String> {
        self.killed.lock().unwrap().clone()
    }
}

impl Default for MockSubstrateAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubstrateAdapter for MockSubstrateAdapter {
    async fn create_subscription_and_add_files(
        &self,
        _block_name: &str,
        files: u64,
    ) -> WorkQueueResult<InjectionResult> {
        let id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        Ok(InjectionResult {
            subscription_id: id,
            files_added: files,
        })
    }

    async fn kill_workflow(&self, request_name: &str) -> WorkQueueResult<()> {
        self.killed.lock().unwrap().push(request_name.to_string());
        Ok(())
    }

    async fn subscription_status(&self) -> WorkQueueResult<Vec<SubstrateStatus>> {
        Ok(Vec::new())
    }

    async fn free_slots(
        &self,
        known_sites: &[String],
    ) -> WorkQueueResult<(BTreeMap<String, u64>, BTreeMap<String, BTreeMap<i64, u64>>)> {
        let guard = self.slots.lock().unwrap();
        let slots = known_sites
            .iter()
            .map(|s| (s.clone(), guard.get(s).copied().unwrap_or(0)))
            .collect();
        Ok((slots, BTreeMap::new()))
    }
}

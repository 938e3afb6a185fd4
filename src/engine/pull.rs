//! `pullWork`: local-queue-only replication of elements down
//! from the parent queue.

use super::Engine;
use crate::error::{WorkQueueError, WorkQueueResult};
use crate::matcher::sort_key;
use crate::model::Status;
use crate::repo::ElementFilter;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

impl Engine {
    /// `pullWork(resources?)`. `resources`, when supplied, is `(jobSlots,
    /// siteJobCounts)`; otherwise it is obtained from the execution
    /// substrate (free slots minus already-queued, keyed by the site
    /// catalog's currently valid sites).
    #[tracing::instrument(skip(self, resources))]
    pub async fn pull_work(
        &self,
        resources: Option<(BTreeMap<String, u64>, BTreeMap<String, BTreeMap<i64, u64>>)>,
    ) -> WorkQueueResult<usize> {
        let parent = self
            .parent_client
            .as_ref()
            .ok_or_else(|| WorkQueueError::Generic("pullWork requires a configured parent queue".to_string()))?;

        // Preconditions: no previous Negotiating transfer still
        // in flight, no local split element still Negotiating.
        let in_flight = self.elements.get(&ElementFilter::by_status(Status::Negotiating)).await?;
        if !in_flight.is_empty() {
            return Ok(0);
        }

        let (job_slots, _job_counts) = match resources {
            Some(r) => r,
            None => {
                let known_sites: Vec<String> = self.sitedb.valid_sites().await?.into_iter().collect();
                self.substrate.free_slots(&known_sites).await?
            }
        };

        let site_keys: BTreeSet<String> = job_slots.keys().cloned().collect();
        if site_keys.is_empty() {
            return Ok(0);
        }

        let mut candidates = parent.available_work(&site_keys, &BTreeSet::new()).await?;
        candidates.sort_by_key(sort_key);
        candidates.truncate(self.tunables.work_per_cycle);

        let self_url = self.tunables.self_url.to_string();
        let parent_url = self.tunables.parent_queue_url.as_ref().map(|u| u.to_string());

        let mut marked = Vec::with_capacity(candidates.len());
        for element in &candidates {
            let mut parent_copy = element.clone();
            parent_copy.status = Status::Negotiating;
            parent_copy.child_queue_url = Some(self_url.clone());
            parent_copy.parent_queue_url = parent_url.clone();
            parent_copy.wmbs_url = Some(self_url.clone());
            parent_copy.update_time = Utc::now();
            marked.push(parent_copy);
        }
        if !marked.is_empty() {
            parent.save(&marked).await?;
        }

        let mut local_copies = Vec::with_capacity(candidates.len());
        for element in candidates {
            let mut local = element;
            local.status = Status::Available;
            local.child_queue_url = None;
            local.parent_queue_url = parent_url.clone();
            local.version = 0;
            local_copies.push(local);
        }
        let count = local_copies.len();
        if count > 0 {
            self.elements.insert(&local_copies).await?;
        }

        Ok(count)
    }
}

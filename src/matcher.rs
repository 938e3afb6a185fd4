//! Matcher. Read-only: promotion to `Acquired` is the engine's
//! job after matching.

use crate::model::Element;
use std::collections::BTreeMap;

pub struct MatchInput {
    /// Elements already filtered by the store to `Available` status,
    /// `PossibleSite` intersecting the offered sites, and not belonging to
    /// an excluded workflow.
    pub candidates: Vec<Element>,
    /// site → free slots.
    pub job_slots: BTreeMap<String, i64>,
    /// site → (priority → jobs already queued at that priority or higher).
    pub site_job_counts: BTreeMap<String, BTreeMap<i64, u64>>,
    pub num_elems: usize,
}

pub struct MatchResult {
    pub matched: Vec<Element>,
    pub remaining_slots: BTreeMap<String, i64>,
    pub updated_counts: BTreeMap<String, BTreeMap<i64, u64>>,
}

/// Sort by `(−Priority, InsertTime)`: higher priority first, FIFO within a
/// priority band. Also used by `pullWork`
/// to pick which eligible elements to replicate down first when more are
/// available than `WorkPerCycle` allows.
pub(crate) fn sort_key(e: &Element) -> (std::cmp::Reverse<i64>, chrono::DateTime<chrono::Utc>) {
    (std::cmp::Reverse(e.priority), e.insert_time)
}

/// Greedy priority/FIFO matcher. For each candidate, in priority/FIFO
/// order, picks the alphabetically-first eligible site with a free slot and
/// no higher-priority band already starved there, admits the element even if
/// that overshoots the site's slot count (by at most one element — property
/// 3's "greedy-by-one overshoot bound"), and decrements the site's
/// free-slot counter.
pub fn match_elements(input: MatchInput) -> MatchResult {
    let MatchInput {
        mut candidates,
        mut job_slots,
        mut site_job_counts,
        num_elems,
    } = input;

    candidates.sort_by_key(sort_key);

    let mut matched = Vec::new();

    for element in candidates {
        if matched.len() >= num_elems {
            break;
        }

        let mut eligible_sites: Vec<&String> = element
            .possible_site
            .iter()
            .filter(|site| *job_slots.get(*site).unwrap_or(&0) > 0)
            .filter(|site| {
                site_job_counts
                    .get(*site)
                    .map(|by_priority| {
                        by_priority
                            .range((element.priority + 1)..)
                            .all(|(_, jobs)| *jobs == 0)
                    })
                    .unwrap_or(true)
            })
            // ^ rejects a site where a higher-priority band is starved: it
            // already has jobs queued at a priority strictly above this
            // element's, so it gets first claim on the site's slots.
            .collect();
        eligible_sites.sort();

        let Some(site) = eligible_sites.into_iter().next().cloned() else {
            continue;
        };

        let slot = job_slots.entry(site.clone()).or_insert(0);
        *slot -= element.jobs as i64;

        let counts = site_job_counts.entry(site).or_default();
        *counts.entry(element.priority).or_insert(0) += element.jobs;

        matched.push(element);
    }

    MatchResult {
        matched,
        remaining_slots: job_slots,
        updated_counts: site_job_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EndPolicyName, StartPolicyName, Status};
    use chrono::Utc;
    use std::collections::BTreeMap as Map;
    use std::collections::BTreeSet;

    fn element(id: &str, priority: i64, site: &str) -> Element {
        let now = Utc::now();
        let mut possible_site = BTreeSet::new();
        possible_site.insert(site.to_string());
        Element {
            id: id.to_string(),
            request_name: "wf".to_string(),
            task_name: "Task1".to_string(),
            status: Status::Available,
            priority,
            inputs: Map::new(),
            mask: None,
            jobs: 1,
            number_of_events: 0,
            number_of_lumis: 0,
            number_of_files: 0,
            percent_complete: 0.0,
            percent_success: 0.0,
            parent_queue_id: None,
            parent_queue_url: None,
            child_queue_url: None,
            wmbs_url: None,
            subscription_id: None,
            start_policy: StartPolicyName::Block,
            end_policy: EndPolicyName::SingleShot,
            team_name: None,
            open_for_new_data: false,
            timestamp_found_new_data: None,
            num_of_files_added: 0,
            possible_site,
            location_refresh_time: None,
            update_time: now,
            insert_time: now,
            version: 0,
        }
    }

    /// S2: A (priority 10) and B (priority 5), both eligible at site X
    /// with slots=1; matcher must return A only.
    #[test]
    fn s2_matcher_priority() {
        let a = element("A", 10, "X");
        let b = element("B", 5, "X");

        let mut job_slots = Map::new();
        job_slots.insert("X".to_string(), 1);

        let result = match_elements(MatchInput {
            candidates: vec![b, a],
            job_slots,
            site_job_counts: Map::new(),
            num_elems: 10,
        });

        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].id, "A");
    }

    /// A lower-priority element must not claim a site's slot while a
    /// higher-priority band still has jobs recorded there.
    #[test]
    fn starved_higher_priority_band_blocks_lower_priority_site() {
        let low = element("B", 5, "X");

        let mut job_slots = Map::new();
        job_slots.insert("X".to_string(), 1);

        let mut site_job_counts = Map::new();
        let mut by_priority = Map::new();
        by_priority.insert(10, 1u64);
        site_job_counts.insert("X".to_string(), by_priority);

        let result = match_elements(MatchInput {
            candidates: vec![low],
            job_slots,
            site_job_counts,
            num_elems: 10,
        });

        assert!(result.matched.is_empty());
    }

    #[test]
    fn greedy_by_one_overshoot_bound() {
        let mut e1 = element("A", 10, "X");
        e1.jobs = 5;
        let mut e2 = element("B", 10, "X");
        e2.jobs = 5;

        let mut job_slots = Map::new();
        job_slots.insert("X".to_string(), 1);

        let result = match_elements(MatchInput {
            candidates: vec![e1, e2],
            job_slots,
            site_job_counts: Map::new(),
            num_elems: 10,
        });

        // Only one element should be admitted: after it the slot count goes
        // negative, so the second can't find an eligible site.
        assert_eq!(result.matched.len(), 1);
        assert_eq!(*result.remaining_slots.get("X").unwrap(), -4);
    }
}

use crate::model::{Element, Status};

/// Result of folding a workflow's elements into an aggregate status.
/// The reconciler is a pure function of its inputs: it never writes
/// anything itself, it only reports what the aggregate *would* be, leaving
/// the decision to persist to the engine (`engine::reconcile`).
#[derive(Debug, Clone, PartialEq)]
pub struct EndPolicyOutcome {
    pub status: Status,
    pub percent_complete: f64,
    pub percent_success: f64,
}

/// `SingleShot(elements, parents, SuccessThreshold=T)`.
pub fn single_shot(elements: &[Element], success_threshold: f64) -> EndPolicyOutcome {
    if elements.is_empty() {
        return EndPolicyOutcome {
            status: Status::Negotiating,
            percent_complete: 0.0,
            percent_success: 0.0,
        };
    }

    if elements.iter().any(|e| e.status == Status::CancelRequested) {
        return EndPolicyOutcome {
            status: Status::CancelRequested,
            percent_complete: job_weighted_mean(elements, |e| e.percent_complete),
            percent_success: job_weighted_mean(elements, |e| e.percent_success),
        };
    }

    let all_end_state = elements.iter().all(|e| e.status.is_end_state());

    if all_end_state {
        let total_jobs: u64 = elements.iter().map(|e| e.jobs).sum();
        let success = if total_jobs == 0 {
            0.0
        } else {
            elements
                .iter()
                .map(|e| e.percent_success / 100.0 * e.jobs as f64)
                .sum::<f64>()
                / total_jobs as f64
        };

        let status = if success >= success_threshold {
            Status::Done
        } else {
            Status::Failed
        };

        return EndPolicyOutcome {
            status,
            percent_complete: 100.0,
            percent_success: success * 100.0,
        };
    }

    EndPolicyOutcome {
        status: Status::Running,
        percent_complete: job_weighted_mean(elements, |e| e.percent_complete),
        percent_success: job_weighted_mean(elements, |e| e.percent_success),
    }
}

fn job_weighted_mean(elements: &[Element], field: impl Fn(&Element) -> f64) -> f64 {
    let total_jobs: u64 = elements.iter().map(|e| e.jobs).sum();
    if total_jobs == 0 {
        return 0.0;
    }
    elements
        .iter()
        .map(|e| field(e) * e.jobs as f64)
        .sum::<f64>()
        / total_jobs as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EndPolicyName, StartPolicyName};
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};

    fn element(status: Status, percent_success: f64) -> Element {
        let now = Utc::now();
        Element {
            id: uuid::Uuid::new_v4().to_string(),
            request_name: "wf".to_string(),
            task_name: "Task1".to_string(),
            status,
            priority: 0,
            inputs: BTreeMap::new(),
            mask: None,
            jobs: 1,
            number_of_events: 0,
            number_of_lumis: 0,
            number_of_files: 0,
            percent_complete: 100.0,
            percent_success,
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
            possible_site: BTreeSet::new(),
            location_refresh_time: None,
            update_time: now,
            insert_time: now,
            version: 0,
        }
    }

    /// S1: 100 elements in end state, first k Done, rest Failed; T=0.9:
    /// Done iff k >= 90, else Failed.
    fn run_scenario(k: usize) -> Status {
        let mut elements = Vec::with_capacity(100);
        for i in 0..100 {
            if i < k {
                elements.push(element(Status::Done, 100.0));
            } else {
                elements.push(element(Status::Failed, 0.0));
            }
        }
        single_shot(&elements, 0.9).status
    }

    #[test]
    fn s1_threshold_boundary() {
        assert_eq!(run_scenario(90), Status::Done);
        assert_eq!(run_scenario(89), Status::Failed);
        assert_eq!(run_scenario(100), Status::Done);
        assert_eq!(run_scenario(0), Status::Failed);
    }

    #[test]
    fn cancel_requested_dominates() {
        let elements = vec![
            element(Status::Done, 100.0),
            element(Status::CancelRequested, 0.0),
        ];
        assert_eq!(single_shot(&elements, 0.9).status, Status::CancelRequested);
    }

    #[test]
    fn running_while_incomplete() {
        let elements = vec![element(Status::Running, 50.0), element(Status::Acquired, 0.0)];
        assert_eq!(single_shot(&elements, 0.9).status, Status::Running);
    }

    #[test]
    fn permutation_invariant() {
        let a = vec![
            element(Status::Done, 100.0),
            element(Status::Failed, 0.0),
            element(Status::Done, 100.0),
        ];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(single_shot(&a, 0.9), single_shot(&b, 0.9));
    }
}

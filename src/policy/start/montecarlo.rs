use super::{new_element, with_mask, SplitContext, SplitResult, StartPolicy};
use crate::error::{WorkQueueError, WorkQueueResult};
use crate::model::{Mask, StartPolicyName};
use async_trait::async_trait;

/// `MonteCarlo`: no input; emits `ceil(total_events / events_per_job)`
/// elements with contiguous, disjoint event-range masks.
///
/// `FilterEfficiency` scales the requested events-per-job upward before
/// the ceil-divide (fewer raw events pass the filter per generated event,
/// so more are generated per job to compensate), grounded on
/// `RequestNumEvents`/`EventsPerJob`/`FilterEfficiency` in
/// `original_source`'s `TaskChain.py`.
pub struct MonteCarloPolicy;

#[async_trait]
impl StartPolicy for MonteCarloPolicy {
    fn name(&self) -> StartPolicyName {
        StartPolicyName::MonteCarlo
    }

    async fn split(&self, ctx: &SplitContext<'_>) -> WorkQueueResult<SplitResult> {
        let total_events = ctx.task.request_num_events.ok_or_else(|| {
            WorkQueueError::TerminalSplitError {
                request_name: ctx.inbox.request_name.clone(),
                reason: "MonteCarlo task missing RequestNumEvents".to_string(),
            }
        })?;
        if total_events == 0 {
            return Err(WorkQueueError::TerminalSplitError {
                request_name: ctx.inbox.request_name.clone(),
                reason: "RequestNumEvents is zero".to_string(),
            });
        }

        let events_per_job = ctx
            .task
            .events_per_job
            .unwrap_or(ctx.tunables.default_events_per_job)
            .max(1);
        let filter_efficiency = ctx.task.filter_efficiency.unwrap_or(1.0).max(f64::EPSILON);

        let effective_events_per_job =
            ((events_per_job as f64) / filter_efficiency).ceil().max(1.0) as u64;

        let jobs = total_events.div_ceil(effective_events_per_job);

        let first_event_base = ctx.task.first_event.unwrap_or(1);
        let first_lumi_base = ctx.task.first_lumi.unwrap_or(1);

        let mut elements = Vec::with_capacity(jobs as usize);
        for i in 0..jobs {
            let first_event = first_event_base + i * effective_events_per_job;
            let last_event = first_event_base
                + ((i + 1) * effective_events_per_job).min(total_events)
                - 1;
            let lumi = first_lumi_base + i;

            let events_in_job = last_event - first_event + 1;
            let element = new_element(ctx, 1, events_in_job, 1, 0);
            let mask = Mask::event_range(first_event, last_event, lumi, lumi);
            elements.push(with_mask(element, mask));
        }

        Ok(SplitResult {
            elements,
            rejected_inputs: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockDbsAdapter, MockPhedexAdapter};
    use crate::config::QueueTunables;
    use crate::model::{InboxElement, Spec, SpecTask, StartPolicyName};
    use chrono::Utc;

    fn task() -> SpecTask {
        SpecTask {
            name: "Production".to_string(),
            start_policy: StartPolicyName::MonteCarlo,
            input_dataset: None,
            parent_processing_flag: false,
            request_num_events: Some(10000),
            events_per_job: Some(250),
            filter_efficiency: Some(1.0),
            first_event: Some(1),
            first_lumi: Some(1),
            files_per_job: None,
            acdc_total_files: None,
            open_running_timeout: None,
        }
    }

    #[tokio::test]
    async fn s5_split_determinism() {
        let spec = Spec {
            name: "MC_Workflow".to_string(),
            request_type: "MonteCarlo".to_string(),
            tasks: vec![task()],
        };
        let inbox = InboxElement::new("MC_Workflow", "spec://MC_Workflow", Utc::now());
        let tunables = QueueTunables::default();
        let dbs = MockDbsAdapter::new();
        let phedex = MockPhedexAdapter::new();
        let ctx = SplitContext {
            spec: &spec,
            task: &spec.tasks[0],
            inbox: &inbox,
            tunables: &tunables,
            dbs: &dbs,
            phedex: &phedex,
            continuous: false,
            resubmit_chunks: &[],
        };

        let result = MonteCarloPolicy.split(&ctx).await.unwrap();
        assert_eq!(result.elements.len(), 40);

        let mut prev_last: u64 = 0;
        for element in &result.elements {
            let mask = element.mask.as_ref().unwrap();
            let first = mask.first_event.unwrap();
            let last = mask.last_event.unwrap();
            assert_eq!(first, prev_last + 1, "ranges must be contiguous");
            assert!(last >= first, "ranges must be non-empty");
            prev_last = last;
        }
        assert_eq!(prev_last, 10000, "ranges must cover up to the requested total");
    }
}

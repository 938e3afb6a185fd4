use super::{new_element, SplitContext, SplitResult, StartPolicy};
use crate::error::WorkQueueResult;
use crate::model::StartPolicyName;
use async_trait::async_trait;

/// `ResubmitBlock`: consumes an ACDC (recovery) collection/fileset; each
/// element points at a `(offset, count)` file chunk. The chunks themselves
/// come from `ctx.resubmit_chunks`, computed by `resubmit_chunks_for` from
/// the task's `acdc_total_files`/`files_per_job` before the context is
/// built (see `engine::ingest`/`engine::close`).
pub struct ResubmitBlockPolicy;

#[async_trait]
impl StartPolicy for ResubmitBlockPolicy {
    fn name(&self) -> StartPolicyName {
        StartPolicyName::ResubmitBlock
    }

    async fn split(&self, ctx: &SplitContext<'_>) -> WorkQueueResult<SplitResult> {
        let mut elements = Vec::with_capacity(ctx.resubmit_chunks.len());
        for &(offset, count) in ctx.resubmit_chunks {
            let mut element = new_element(ctx, 1, 0, 0, count);
            element
                .inputs
                .insert(format!("acdc:{}:offset={offset}:count={count}", ctx.inbox.request_name), Vec::new());
            elements.push(element);
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
    use crate::model::{InboxElement, Spec, SpecTask};
    use crate::policy::start::resubmit_chunks_for;
    use chrono::Utc;

    fn task(acdc_total_files: Option<u64>, files_per_job: Option<u64>) -> SpecTask {
        SpecTask {
            name: "Resubmission".to_string(),
            start_policy: StartPolicyName::ResubmitBlock,
            input_dataset: None,
            parent_processing_flag: false,
            request_num_events: None,
            events_per_job: None,
            filter_efficiency: None,
            first_event: None,
            first_lumi: None,
            files_per_job,
            acdc_total_files,
            open_running_timeout: None,
        }
    }

    #[test]
    fn resubmit_chunks_for_divides_by_files_per_job() {
        let tunables = QueueTunables::default();
        let chunks = resubmit_chunks_for(&task(Some(25), Some(10)), &tunables);
        assert_eq!(chunks, vec![(0, 10), (10, 10), (20, 5)]);
    }

    #[test]
    fn resubmit_chunks_for_empty_without_acdc_fileset() {
        let tunables = QueueTunables::default();
        assert!(resubmit_chunks_for(&task(None, Some(10)), &tunables).is_empty());
    }

    #[tokio::test]
    async fn split_emits_one_element_per_chunk() {
        let task = task(Some(25), Some(10));
        let spec = Spec {
            name: "ACDC_Resubmission".to_string(),
            request_type: "Resubmission".to_string(),
            tasks: vec![task],
        };
        let inbox = InboxElement::new("ACDC_Resubmission", "spec://ACDC_Resubmission", Utc::now());
        let tunables = QueueTunables::default();
        let dbs = MockDbsAdapter::new();
        let phedex = MockPhedexAdapter::new();
        let resubmit_chunks = resubmit_chunks_for(&spec.tasks[0], &tunables);
        let ctx = SplitContext {
            spec: &spec,
            task: &spec.tasks[0],
            inbox: &inbox,
            tunables: &tunables,
            dbs: &dbs,
            phedex: &phedex,
            continuous: false,
            resubmit_chunks: &resubmit_chunks,
        };

        let result = ResubmitBlockPolicy.split(&ctx).await.unwrap();
        assert_eq!(result.elements.len(), 3);
        assert_eq!(result.elements[0].number_of_files, 10);
        assert_eq!(result.elements[2].number_of_files, 5);
    }
}

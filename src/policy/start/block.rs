use super::{new_element, SplitContext, SplitResult, StartPolicy};
use crate::error::WorkQueueResult;
use crate::model::StartPolicyName;
use async_trait::async_trait;

/// `Block`: one element per closed block of the task's input dataset,
/// `Inputs` keyed by block name with the PhEDEx replica list as its value.
/// Blocks already in `ProcessedInputs` are skipped in continuous mode.
pub struct BlockPolicy;

#[async_trait]
impl StartPolicy for BlockPolicy {
    fn name(&self) -> StartPolicyName {
        StartPolicyName::Block
    }

    async fn split(&self, ctx: &SplitContext<'_>) -> WorkQueueResult<SplitResult> {
        let dataset = ctx
            .task
            .input_dataset
            .clone()
            .unwrap_or_else(|| ctx.inbox.request_name.clone());

        let block_names = ctx.dbs.list_file_blocks(&dataset, true).await?;
        let files_per_job = ctx.task.files_per_job.unwrap_or(ctx.tunables.default_files_per_job).max(1);

        let mut elements = Vec::new();
        let mut rejected = Vec::new();

        for block_name in block_names {
            if ctx.continuous && ctx.inbox.processed_inputs.contains(&block_name) {
                continue;
            }
            if ctx.inbox.rejected_inputs.contains(&block_name) {
                continue;
            }

            let block = ctx.dbs.get_file_block(&block_name, false).await?;
            if block.files == 0 {
                rejected.push(block_name);
                continue;
            }

            let sites = ctx
                .phedex
                .get_replica_info_for_blocks(&[block_name.clone()])
                .await?
                .remove(&block_name)
                .unwrap_or_default();

            let jobs = block.files.div_ceil(files_per_job);
            let mut element = new_element(ctx, jobs, 0, 0, block.files);
            element.inputs.insert(block_name, sites);
            elements.push(element);
        }

        Ok(SplitResult {
            elements,
            rejected_inputs: rejected,
        })
    }

    async fn new_data_available(&self, ctx: &SplitContext<'_>) -> WorkQueueResult<bool> {
        let dataset = ctx
            .task
            .input_dataset
            .clone()
            .unwrap_or_else(|| ctx.inbox.request_name.clone());
        let block_names = ctx.dbs.list_file_blocks(&dataset, true).await?;
        Ok(block_names.iter().any(|b| {
            !ctx.inbox.processed_inputs.contains(b) && !ctx.inbox.rejected_inputs.contains(b)
        }))
    }
}

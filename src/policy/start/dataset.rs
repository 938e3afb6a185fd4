use super::{new_element, SplitContext, SplitResult, StartPolicy};
use crate::error::WorkQueueResult;
use crate::model::StartPolicyName;
use async_trait::async_trait;

/// `Dataset`: one element per input dataset; `Inputs` value is the union
/// of all block replicas; block-level file lists are materialized later,
/// at injection time.
pub struct DatasetPolicy;

#[async_trait]
impl StartPolicy for DatasetPolicy {
    fn name(&self) -> StartPolicyName {
        StartPolicyName::Dataset
    }

    async fn split(&self, ctx: &SplitContext<'_>) -> WorkQueueResult<SplitResult> {
        let dataset = ctx
            .task
            .input_dataset
            .clone()
            .unwrap_or_else(|| ctx.inbox.request_name.clone());

        if ctx.continuous && ctx.inbox.processed_inputs.contains(&dataset) {
            return Ok(SplitResult {
                elements: Vec::new(),
                rejected_inputs: Vec::new(),
            });
        }

        let block_names = ctx.dbs.list_file_blocks(&dataset, true).await?;
        if block_names.is_empty() {
            return Ok(SplitResult {
                elements: Vec::new(),
                rejected_inputs: vec![dataset],
            });
        }

        let mut total_files = 0u64;
        let mut sites = Vec::new();
        for block_name in &block_names {
            let block = ctx.dbs.get_file_block(block_name, false).await?;
            total_files += block.files;
            let block_sites = ctx
                .phedex
                .get_replica_info_for_blocks(&[block_name.clone()])
                .await?
                .remove(block_name)
                .unwrap_or_default();
            for site in block_sites {
                if !sites.contains(&site) {
                    sites.push(site);
                }
            }
        }

        let files_per_job = ctx.task.files_per_job.unwrap_or(ctx.tunables.default_files_per_job).max(1);
        let jobs = total_files.div_ceil(files_per_job);

        let mut element = new_element(ctx, jobs.max(1), 0, 0, total_files);
        element.inputs.insert(dataset, sites);

        Ok(SplitResult {
            elements: vec![element],
            rejected_inputs: Vec::new(),
        })
    }

    async fn new_data_available(&self, ctx: &SplitContext<'_>) -> WorkQueueResult<bool> {
        let dataset = ctx
            .task
            .input_dataset
            .clone()
            .unwrap_or_else(|| ctx.inbox.request_name.clone());
        Ok(!ctx.inbox.processed_inputs.contains(&dataset) && !ctx.inbox.rejected_inputs.contains(&dataset))
    }
}

pub mod end;
pub mod start;

use crate::model::StartPolicyName;
use start::block::BlockPolicy;
use start::dataset::DatasetPolicy;
use start::montecarlo::MonteCarloPolicy;
use start::resubmit_block::ResubmitBlockPolicy;
use start::StartPolicy;

/// Resolves a spec task's declared start-policy name to its strategy
/// implementation.
pub fn resolve_start_policy(name: StartPolicyName) -> Box<dyn StartPolicy> {
    match name {
        StartPolicyName::Block => Box::new(BlockPolicy),
        StartPolicyName::Dataset => Box::new(DatasetPolicy),
        StartPolicyName::MonteCarlo => Box::new(MonteCarloPolicy),
        StartPolicyName::ResubmitBlock => Box::new(ResubmitBlockPolicy),
    }
}

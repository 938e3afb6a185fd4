use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

/// Strategy name for the start-policy splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum)]
#[serde(rename_all = "PascalCase")]
#[oai(rename_all = "PascalCase")]
pub enum StartPolicyName {
    Block,
    Dataset,
    MonteCarlo,
    ResubmitBlock,
}

impl StartPolicyName {
    /// Only `Block` and `Dataset` are eligible for the continuous-split
    /// loop.
    pub fn supports_work_addition(self) -> bool {
        matches!(self, StartPolicyName::Block | StartPolicyName::Dataset)
    }
}

impl std::fmt::Display for StartPolicyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// End-policy strategy name. `SingleShot` is the only one this
/// engine implements; the tag leaves room for others without them existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum, Default)]
#[serde(rename_all = "PascalCase")]
#[oai(rename_all = "PascalCase")]
pub enum EndPolicyName {
    #[default]
    SingleShot,
}

/// One top-level task of a spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SpecTask {
    pub name: String,
    pub start_policy: StartPolicyName,
    pub input_dataset: Option<String>,
    pub parent_processing_flag: bool,

    /// MonteCarlo-only parameters.
    pub request_num_events: Option<u64>,
    pub events_per_job: Option<u64>,
    pub filter_efficiency: Option<f64>,
    pub first_event: Option<u64>,
    pub first_lumi: Option<u64>,

    /// Block/Dataset-only splitting size override.
    pub files_per_job: Option<u64>,

    /// ResubmitBlock-only: total file count of the ACDC recovery fileset
    /// this task resubmits. Chunked into `(offset, count)` pairs by
    /// `files_per_job` the same way `Block` chunks a dataset's files.
    pub acdc_total_files: Option<u64>,

    /// Open-ended continuous mode timeout in seconds; `None` means close
    /// immediately once split.
    pub open_running_timeout: Option<u64>,
}

/// A workflow specification, opaque to the queue except through these
/// accessors. `Spec` here is the in-memory materialization the
/// engine's spec-cache adapter hands back; the actual artifact lives at
/// `spec_url` and is fetched/cached per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Spec {
    pub name: String,
    pub request_type: String,
    pub tasks: Vec<SpecTask>,
}

impl Spec {
    pub fn task(&self, name: &str) -> Option<&SpecTask> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn top_level_tasks(&self) -> impl Iterator<Item = &SpecTask> {
        self.tasks.iter()
    }
}

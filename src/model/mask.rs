use poem_openapi::Object;
use serde::{Deserialize, Serialize};

/// Optional event/lumi/run sub-range carried by a split element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Mask {
    pub first_event: Option<u64>,
    pub last_event: Option<u64>,
    pub first_lumi: Option<u64>,
    pub last_lumi: Option<u64>,
    pub first_run: Option<u64>,
    pub last_run: Option<u64>,
}

impl Mask {
    pub fn event_range(first_event: u64, last_event: u64, first_lumi: u64, last_lumi: u64) -> Self {
        Self {
            first_event: Some(first_event),
            last_event: Some(last_event),
            first_lumi: Some(first_lumi),
            last_lumi: Some(last_lumi),
            first_run: None,
            last_run: None,
        }
    }
}

use crate::error::WorkQueueResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Replica-location source.
#[async_trait]
pub trait PhedexAdapter: Send + Sync {
    async fn get_replica_info_for_blocks(
        &self,
        blocks: &[String],
    ) -> WorkQueueResult<BTreeMap<String, Vec<String>>>;
}

pub struct MockPhedexAdapter {
    replicas_by_block: Mutex<BTreeMap<String, Vec<String>>>,
}

impl MockPhedexAdapter {
    pub fn new() -> Self {
        Self {
            replicas_by_block: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_block(self, block: impl Into<String>, sites: Vec<String>) -> Self {
        self.replicas_by_block.lock().unwrap().insert(block.into(), sites);
        self
    }
}

impl Default for MockPhedexAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhedexAdapter for MockPhedexAdapter {
    async fn get_replica_info_for_blocks(
        &self,
        blocks: &[String],
    ) -> WorkQueueResult<BTreeMap<String, Vec<String>>> {
        let guard = self.replicas_by_block.lock().unwrap();
        Ok(blocks
            .iter()
            .map(|b| (b.clone(), guard.get(b).cloned().unwrap_or_default()))
            .collect())
    }
}

use crate::error::WorkQueueResult;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Site catalog: canonicalizes PhEDEx node names to queue-level site names
/// and reports which sites are currently valid.
#[async_trait]
pub trait SiteDbAdapter: Send + Sync {
    async fn canonical_site_name(&self, phedex_node_name: &str) -> WorkQueueResult<Option<String>>;
    async fn valid_sites(&self) -> WorkQueueResult<BTreeSet<String>>;
}

pub struct MockSiteDbAdapter {
    canonical: Mutex<BTreeMap<String, String>>,
}

impl MockSiteDbAdapter {
    pub fn new() -> Self {
        Self {
            canonical: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_mapping(self, node: impl Into<String>, site: impl Into<String>) -> Self {
        self.canonical.lock().unwrap().insert(node.into(), site.into());
        self
    }
}

impl Default for MockSiteDbAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteDbAdapter for MockSiteDbAdapter {
    async fn canonical_site_name(&self, phedex_node_name: &str) -> WorkQueueResult<Option<String>> {
        Ok(self.canonical.lock().unwrap().get(phedex_node_name).cloned())
    }

    async fn valid_sites(&self) -> WorkQueueResult<BTreeSet<String>> {
        Ok(self.canonical.lock().unwrap().values().cloned().collect())
    }
}

use crate::error::{WorkQueueError, WorkQueueResult};
use crate::model::Spec;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Thin accessor the engine uses to fetch a `Spec` by URL from whatever
/// document store owns it, with a per-cycle cache. The document store
/// itself is an external collaborator this crate doesn't implement.
#[async_trait]
pub trait SpecStore: Send + Sync {
    async fn load(&self, spec_url: &str) -> WorkQueueResult<Spec>;
}

pub struct InMemorySpecStore {
    specs: Mutex<BTreeMap<String, Spec>>,
}

impl InMemorySpecStore {
    pub fn new() -> Self {
        Self {
            specs: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_spec(self, url: impl Into<String>, spec: Spec) -> Self {
        self.specs.lock().unwrap().insert(url.into(), spec);
        self
    }
}

impl Default for InMemorySpecStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpecStore for InMemorySpecStore {
    async fn load(&self, spec_url: &str) -> WorkQueueResult<Spec> {
        self.specs
            .lock()
            .unwrap()
            .get(spec_url)
            .cloned()
            .ok_or_else(|| WorkQueueError::Generic(format!("no such spec: {spec_url}")))
    }
}

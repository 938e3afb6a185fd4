use crate::error::WorkQueueResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Shape of `getFileBlock`/`getFileBlockWithParents`.
#[derive(Debug, Clone, Default)]
pub struct FileBlock {
    pub name: String,
    pub files: u64,
    pub is_open: bool,
    pub phedex_node_names: Vec<String>,
    pub parent_files: u64,
}

/// Read-only view over the dataset/block metadata source.
#[async_trait]
pub trait DbsAdapter: Send + Sync {
    async fn list_file_blocks(&self, dataset: &str, only_closed_blocks: bool) -> WorkQueueResult<Vec<String>>;
    async fn get_file_block(&self, block_name: &str, dbs_only: bool) -> WorkQueueResult<FileBlock>;
    async fn get_file_block_with_parents(&self, block_name: &str) -> WorkQueueResult<FileBlock>;
}

/// A finite, enumerated dispatch-table test double, grounded on
/// `MockDbsApi.py`'s per-dataset fixture dictionaries rather than its
/// `__getattr__` fall-through.
pub struct MockDbsAdapter {
    blocks_by_dataset: Mutex<BTreeMap<String, Vec<FileBlock>>>,
}

impl MockDbsAdapter {
    pub fn new() -> Self {
        Self {
            blocks_by_dataset: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_dataset(self, dataset: impl Into<String>, blocks: Vec<FileBlock>) -> Self {
        self.blocks_by_dataset
            .lock()
            .unwrap()
            .insert(dataset.into(), blocks);
        self
    }
}

impl Default for MockDbsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DbsAdapter for MockDbsAdapter {
    async fn list_file_blocks(&self, dataset: &str, only_closed_blocks: bool) -> WorkQueueResult<Vec<String>> {
        let guard = self.blocks_by_dataset.lock().unwrap();
        let blocks = guard.get(dataset).cloned().unwrap_or_default();
        Ok(blocks
            .into_iter()
            .filter(|b| !only_closed_blocks || !b.is_open)
            .map(|b| b.name)
            .collect())
    }

    async fn get_file_block(&self, block_name: &str, _dbs_only: bool) -> WorkQueueResult<FileBlock> {
        let guard = self.blocks_by_dataset.lock().unwrap();
        for blocks in guard.values() {
            if let Some(block) = blocks.iter().find(|b| b.name == block_name) {
                return Ok(block.clone());
            }
        }
        Ok(FileBlock {
            name: block_name.to_string(),
            ..Default::default()
        })
    }

    async fn get_file_block_with_parents(&self, block_name: &str) -> WorkQueueResult<FileBlock> {
        let mut block = self.get_file_block(block_name, false).await?;
        block.parent_files = block.files;
        Ok(block)
    }
}

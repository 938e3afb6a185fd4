//! External interfaces: read-only metadata views (DBS, PhEDEx,
//! site catalog), the execution-substrate adapter, and the request-manager
//! client. Real adapters call out over `reqwest`; mock adapters (used in
//! tests and local dev) are a finite dispatch table keyed by method name,
//! grounded on `MockDbsApi.py`'s `__getattr__` fall-through.

pub mod dbs;
pub mod parent_queue;
pub mod phedex;
pub mod request_manager;
pub mod sitedb;
pub mod spec_store;
pub mod substrate;

pub use dbs::{DbsAdapter, FileBlock, MockDbsAdapter};
pub use parent_queue::{HttpParentQueueClient, InProcessParentQueueClient, ParentQueueClient};
pub use phedex::{MockPhedexAdapter, PhedexAdapter};
pub use request_manager::{MockRequestManagerAdapter, RequestManagerAdapter, RequestStats};
pub use sitedb::{MockSiteDbAdapter, SiteDbAdapter};
pub use spec_store::{InMemorySpecStore, SpecStore};
pub use substrate::{InjectionResult, MockSubstrateAdapter, SubstrateAdapter, SubstrateStatus};

//! Backend store: a document store over `elements` and
//! `inbox_elements`, with per-document optimistic-concurrency version
//! tokens. Grounded on `WorkQueue.py`'s `self.backend.*` calls; the dynamic
//! query-building style is simplified from `cloud-common::repo`'s
//! `RowMeta<DB>` generic-over-`Database` abstraction down to direct
//! `sqlx::Any` queries, since only one pool type is in play here (see
//! `DESIGN.md`).

pub mod elements;
pub mod inbox;
pub mod journal;

pub use elements::{ElementFilter, ElementRepo, SqlxElementRepo};
pub use inbox::{InboxRepo, SqlxInboxRepo};
pub use journal::{JournalRepo, SqlxJournalRepo};

use crate::error::WorkQueueError;

/// Bounded retry count for the optimistic-concurrency save loop.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 5;

/// A version-checked write came back with zero rows affected: someone else
/// won the race. Callers re-read, merge, and retry.
#[derive(Debug)]
pub struct VersionConflict;

pub(crate) fn exhausted_retries(op: &str) -> WorkQueueError {
    WorkQueueError::Repo(format!(
        "exhausted optimistic-concurrency retries while performing {op}"
    ))
}

//! Error kinds for the work-queue engine plus the `SafeDisplay`
//! split between internal detail (`Display`) and what may cross the REST
//! boundary (`to_safe_string`).

use thiserror::Error;

/// Types that carry information not all of which is safe to return to an
/// API caller. `Display` may include internal detail (row ids, DB errors);
/// `to_safe_string` is the subset that is safe to surface externally.
pub trait SafeDisplay {
    fn to_safe_string(&self) -> String;
}

/// Errors raised by the queue engine's administrative operations.
#[derive(Debug, Error, Clone)]
pub enum WorkQueueError {
    /// Generic engine failure; carries a human-readable message.
    #[error("work queue error: {0}")]
    Generic(String),

    /// `request` argument disagreed with `spec.name()`.
    #[error("spec identity mismatch: caller supplied '{request}' but spec is named '{spec_name}'")]
    WMSpecError { request: String, spec_name: String },

    /// A filter matched nothing; distinct from a failure.
    #[error("no matching elements for the given filter")]
    NoMatchingElements,

    /// The splitter could not produce any element for a workflow. Fatal:
    /// the inbox element is driven to `Failed`.
    #[error("terminal split error for workflow '{request_name}': {reason}")]
    TerminalSplitError { request_name: String, reason: String },

    /// A metadata or substrate adapter RPC failed. Non-fatal: the element
    /// is skipped this cycle and retried next cycle.
    #[error("transient adapter error calling {adapter} for '{target}': {reason}")]
    TransientAdapterError {
        adapter: &'static str,
        target: String,
        reason: String,
    },

    /// Underlying persistence failure.
    #[error("repository error: {0}")]
    Repo(String),
}

impl SafeDisplay for WorkQueueError {
    fn to_safe_string(&self) -> String {
        match self {
            WorkQueueError::Generic(msg) => msg.clone(),
            WorkQueueError::WMSpecError { request, spec_name } => {
                format!("spec identity mismatch: '{request}' vs '{spec_name}'")
            }
            WorkQueueError::NoMatchingElements => "no matching elements".to_string(),
            WorkQueueError::TerminalSplitError { request_name, .. } => {
                format!("workflow '{request_name}' failed to split")
            }
            WorkQueueError::TransientAdapterError { adapter, target, .. } => {
                format!("{adapter} temporarily unavailable for '{target}'")
            }
            WorkQueueError::Repo(_) => "internal storage error".to_string(),
        }
    }
}

impl From<sqlx::Error> for WorkQueueError {
    fn from(e: sqlx::Error) -> Self {
        WorkQueueError::Repo(e.to_string())
    }
}

pub type WorkQueueResult<T> = Result<T, WorkQueueError>;

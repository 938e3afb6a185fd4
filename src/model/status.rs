use poem_openapi::Enum;
use serde::{Deserialize, Serialize};

/// Element/inbox-element lifecycle state.
///
/// Ordered so that `Status::merge` can pick the maximum along the
/// state-machine's partial order: `{Available, Negotiating} < Acquired <
/// Running < CancelRequested < {Done, Failed, Canceled}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum, PartialOrd, Ord,
)]
#[serde(rename_all = "PascalCase")]
#[oai(rename_all = "PascalCase")]
pub enum Status {
    Available,
    Negotiating,
    Acquired,
    Running,
    CancelRequested,
    Done,
    Failed,
    Canceled,
}

impl Status {
    pub fn is_end_state(self) -> bool {
        matches!(self, Status::Done | Status::Failed | Status::Canceled)
    }

    pub fn is_terminal_rank(self) -> bool {
        self.is_end_state()
    }

    /// Rank within the terminal band, used only to break ties when two
    /// terminal statuses race at merge time (Open Question decision,
    /// `DESIGN.md`): `Canceled > Failed > Done`.
    fn terminal_priority(self) -> u8 {
        match self {
            Status::Canceled => 3,
            Status::Failed => 2,
            Status::Done => 1,
            _ => 0,
        }
    }

    /// The state-machine partial order's "rank", used to compute a maximum
    /// at conflict-merge time.
    fn rank(self) -> u8 {
        match self {
            Status::Available | Status::Negotiating => 0,
            Status::Acquired => 1,
            Status::Running => 2,
            Status::CancelRequested => 3,
            Status::Done | Status::Failed | Status::Canceled => 4,
        }
    }

    /// Status-max merge: never regress a status, and break terminal-vs-
    /// terminal ties by fixed priority rather than arbitrarily picking
    /// whichever write happened to be applied last.
    pub fn merge(self, other: Status) -> Status {
        match self.rank().cmp(&other.rank()) {
            std::cmp::Ordering::Greater => self,
            std::cmp::Ordering::Less => other,
            std::cmp::Ordering::Equal => {
                if self.is_terminal_rank() && self.terminal_priority() >= other.terminal_priority()
                {
                    self
                } else if self.is_terminal_rank() {
                    other
                } else {
                    self
                }
            }
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_never_regresses() {
        assert_eq!(Status::Running.merge(Status::Acquired), Status::Running);
        assert_eq!(Status::Acquired.merge(Status::Running), Status::Running);
    }

    #[test]
    fn terminal_tie_break_prefers_canceled() {
        assert_eq!(Status::Done.merge(Status::Canceled), Status::Canceled);
        assert_eq!(Status::Canceled.merge(Status::Failed), Status::Canceled);
        assert_eq!(Status::Failed.merge(Status::Done), Status::Failed);
    }

    #[test]
    fn equal_nonterminal_is_stable() {
        assert_eq!(Status::Available.merge(Status::Negotiating), Status::Available);
    }
}

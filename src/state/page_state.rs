/// Page state definitions for tracking crawl progress
use crate::MirrorError;
use std::fmt;

/// Represents the current state of a page in the crawl
///
/// A page is created `Pending` when first enqueued and moves exactly once to
/// `Fetched` or `Failed`; terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    /// Enqueued and waiting to be fetched
    Pending,

    /// Fetched and materialized into the output tree
    Fetched,

    /// Fetch or write failed
    Failed,
}

impl PageState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched)
    }

    /// Validates and performs a transition to `to`
    pub fn transition(self, to: PageState) -> Result<PageState, MirrorError> {
        match (self, to) {
            (Self::Pending, Self::Fetched) | (Self::Pending, Self::Failed) => Ok(to),
            (from, to) => Err(MirrorError::InvalidTransition { from, to }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetched => "fetched",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

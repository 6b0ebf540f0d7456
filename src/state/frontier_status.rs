/// Frontier status definitions for tracking crawl progress
///
/// This module defines the states a frontier entry moves through and which
/// transitions between them are legal.
use std::fmt;

/// Represents the current status of a frontier entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontierStatus {
    /// Waiting for a crawl step
    Pending,

    /// Crawled successfully; eligible for re-activation once stale
    Completed,

    /// Beyond the maximum traversal depth, never fetched
    Skipped,
}

impl FrontierStatus {
    /// Returns true if moving from `self` to `to` is a legal transition
    ///
    /// Legal transitions:
    /// - `Pending -> Completed` after a full crawl step
    /// - `Pending -> Skipped` when the depth limit is exceeded
    /// - `Completed -> Pending` from the staleness sweep
    /// - `Skipped -> Pending` when an operator requeues skipped entries as roots
    pub fn can_transition_to(&self, to: FrontierStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Skipped)
                | (Self::Completed, Self::Pending)
                | (Self::Skipped, Self::Pending)
        )
    }

    /// Returns true if the entry is waiting for work
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![Self::Pending, Self::Completed, Self::Skipped]
    }
}

impl fmt::Display for FrontierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

//! Account knowledge state
//!
//! When a frontier entry becomes active, the account it points at is in one of
//! three states. Each state maps to exactly one enrichment action.

use crate::storage::AccountRecord;

/// How much the store knows about an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountState {
    /// No account row exists
    Unknown,

    /// Created as someone's neighbour; profile never fetched
    Minimal,

    /// Profile fetched at least once
    Enriched,
}

/// What the crawl step does to an account's profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichAction {
    /// Insert the account row while persisting the profile
    pub create: bool,

    /// Refresh mode: keep inferred identity fields from the store
    pub refresh: bool,
}

impl AccountState {
    /// Derives the state from an optional stored account
    pub fn of(record: Option<&AccountRecord>) -> Self {
        match record {
            None => Self::Unknown,
            Some(r) if r.is_enriched => Self::Enriched,
            Some(_) => Self::Minimal,
        }
    }

    /// Looks up the enrichment action for this state
    pub fn action(&self) -> EnrichAction {
        match self {
            Self::Unknown => EnrichAction {
                create: true,
                refresh: false,
            },
            Self::Minimal => EnrichAction {
                create: false,
                refresh: false,
            },
            Self::Enriched => EnrichAction {
                create: false,
                refresh: true,
            },
        }
    }
}

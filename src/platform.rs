//! Platform collaborator interface
//!
//! The crawl engine never talks HTTP directly. Everything it needs from the
//! code-hosting platform goes through the [`Platform`] trait, which the
//! [`crate::github`] module implements against the GitHub GraphQL API and tests
//! implement with in-memory fakes.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Kind of account on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountKind {
    Person,
    Organization,
}

impl AccountKind {
    /// Converts the kind to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Organization => "organization",
        }
    }

    /// Parses a kind from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "person" => Some(Self::Person),
            "organization" => Some(Self::Organization),
            _ => None,
        }
    }

    /// Maps a GraphQL `__typename` onto an account kind
    pub fn from_typename(typename: &str) -> Option<Self> {
        match typename {
            "User" => Some(Self::Person),
            "Organization" => Some(Self::Organization),
            _ => None,
        }
    }
}

/// Minimal reference to an account: identity, handle and kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountRef {
    /// Stable numeric platform id
    pub id: i64,

    /// Current handle (login)
    pub handle: String,

    pub kind: AccountKind,
}

impl AccountRef {
    pub fn new(id: i64, handle: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            id,
            handle: handle.into(),
            kind,
        }
    }
}

/// Which side of the sponsorship relation the active account is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Edges where the account is the sponsor (its "sponsoring" listing)
    AsSponsor,

    /// Edges where the account is sponsored (its "sponsors" listing)
    AsSponsored,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AsSponsor => "sponsoring",
            Self::AsSponsored => "sponsors",
        }
    }
}

/// Inferred identity fields, computed once and never overwritten by a refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub gender: Option<String>,
    pub has_pronouns: bool,
}

/// Normalized profile attributes returned by enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileFields {
    pub id: i64,
    pub handle: String,
    pub kind: AccountKind,
    pub name: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub bio: Option<String>,
    pub hireable: Option<bool>,
    pub email: Option<String>,
    pub twitter_username: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
    pub followers: u32,
    pub following: u32,
    pub public_repos: u32,
    pub public_gists: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub identity: Identity,
}

impl ProfileFields {
    /// Returns the minimal reference for this profile
    pub fn account_ref(&self) -> AccountRef {
        AccountRef::new(self.id, self.handle.clone(), self.kind)
    }
}

/// Outcome of an enrichment request
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    Found(ProfileFields),

    /// The handle no longer exists upstream (deleted or renamed)
    NotFound,

    /// The profile exists but is blocked or legally restricted
    Unavailable,
}

/// A seed candidate resolved upstream before it is enqueued as a root
#[derive(Debug, Clone, PartialEq)]
pub struct SeedCandidate {
    pub account: AccountRef,
    pub sponsors_total: u32,
    pub sponsoring_total: u32,
}

/// One page of a cursor-paginated relationship listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipPage {
    /// Named neighbours on this page
    pub nodes: Vec<AccountRef>,

    /// Entries on this page including anonymous ones
    pub entry_count: usize,

    pub has_more: bool,
    pub next_cursor: Option<String>,

    /// Total size of the listing as reported upstream (private entries included)
    pub total_count: Option<u32>,

    /// Monthly prices of the public recurring tiers
    pub tier_prices: Vec<u32>,

    /// Schema-level error reported alongside the data
    pub error: Option<String>,
}

/// Yearly activity aggregates for one account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearlyActivity {
    pub commits: u32,
    pub pull_requests: u32,
    pub issues: u32,
    pub reviews: u32,
}

/// External collaborator used by the crawl engine
#[async_trait]
pub trait Platform: Send + Sync {
    /// Refreshes any session credential that is about to expire
    async fn refresh_session(&self) -> Result<()> {
        Ok(())
    }

    /// Resolves a handle for seeding, returning `None` if it does not exist
    async fn resolve_seed(&self, handle: &str) -> Result<Option<SeedCandidate>>;

    /// Fetches the profile of `handle`
    ///
    /// On refresh the implementation must not recompute inferred identity
    /// fields; `prior` carries the stored ones.
    async fn enrich(
        &self,
        handle: &str,
        refresh: bool,
        prior: Option<&Identity>,
    ) -> Result<EnrichOutcome>;

    /// Fetches one page of a relationship listing
    ///
    /// Returns `None` when the resource is blocked or legally restricted.
    async fn fetch_relationship_page(
        &self,
        account: &AccountRef,
        direction: Direction,
        cursor: Option<&str>,
    ) -> Result<Option<RelationshipPage>>;

    /// Fetches activity for one calendar year, `None` when unavailable
    async fn fetch_yearly_activity(
        &self,
        account: &AccountRef,
        year: i32,
    ) -> Result<Option<YearlyActivity>>;
}

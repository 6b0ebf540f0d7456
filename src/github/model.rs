//! GraphQL response shapes and their conversion into platform types

use crate::platform::{
    AccountKind, AccountRef, Identity, ProfileFields, RelationshipPage, YearlyActivity,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// GraphQL response envelope
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl GraphQlError {
    pub fn is_not_found(&self) -> bool {
        self.kind.as_deref() == Some("NOT_FOUND")
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind.as_deref() == Some("RATE_LIMITED")
    }
}

impl<T> GraphQlResponse<T> {
    pub fn is_rate_limited(&self) -> bool {
        self.errors.iter().any(GraphQlError::is_rate_limited)
    }

    /// First error that is not a plain "not found"
    pub fn structural_error(&self) -> Option<&GraphQlError> {
        self.errors.iter().find(|e| !e.is_not_found())
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u32,
}

// ===== Profile =====

#[derive(Debug, Deserialize)]
pub struct OwnerData {
    pub owner: Option<OwnerNode>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
pub enum OwnerNode {
    User(UserNode),
    Organization(OrganizationNode),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNode {
    pub database_id: Option<i64>,
    pub login: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub is_hireable: bool,
    pub email: Option<String>,
    pub twitter_username: Option<String>,
    pub avatar_url: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub pronouns: Option<String>,
    #[serde(default)]
    pub followers: TotalCount,
    #[serde(default)]
    pub following: TotalCount,
    #[serde(default)]
    pub repositories: TotalCount,
    #[serde(default)]
    pub gists: TotalCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationNode {
    pub database_id: Option<i64>,
    pub login: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub twitter_username: Option<String>,
    pub avatar_url: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repositories: TotalCount,
}

/// GitHub reports hidden strings as empty rather than null
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl OwnerNode {
    /// Converts the node into profile fields
    ///
    /// Identity fields are filled from the response; callers refreshing an
    /// account overwrite them with the stored ones. Returns `None` when the
    /// node has no numeric id.
    pub fn into_profile(self) -> Option<ProfileFields> {
        match self {
            OwnerNode::User(user) => {
                let has_pronouns = non_empty(user.pronouns).is_some();
                Some(ProfileFields {
                    id: user.database_id?,
                    handle: user.login,
                    kind: AccountKind::Person,
                    name: non_empty(user.name),
                    location: non_empty(user.location),
                    company: non_empty(user.company),
                    bio: non_empty(user.bio),
                    hireable: Some(user.is_hireable),
                    email: non_empty(user.email),
                    twitter_username: non_empty(user.twitter_username),
                    avatar_url: user.avatar_url,
                    profile_url: user.url,
                    followers: user.followers.total_count,
                    following: user.following.total_count,
                    public_repos: user.repositories.total_count,
                    public_gists: user.gists.total_count,
                    created_at: user.created_at,
                    identity: Identity {
                        gender: None,
                        has_pronouns,
                    },
                })
            }
            OwnerNode::Organization(org) => Some(ProfileFields {
                id: org.database_id?,
                handle: org.login,
                kind: AccountKind::Organization,
                name: non_empty(org.name),
                location: non_empty(org.location),
                company: None,
                bio: non_empty(org.description),
                hireable: None,
                email: non_empty(org.email),
                twitter_username: non_empty(org.twitter_username),
                avatar_url: org.avatar_url,
                profile_url: org.url,
                followers: 0,
                following: 0,
                public_repos: org.repositories.total_count,
                public_gists: 0,
                created_at: org.created_at,
                identity: Identity::default(),
            }),
        }
    }
}

// ===== Seed resolution =====

#[derive(Debug, Deserialize)]
pub struct SeedData {
    pub owner: Option<SeedOwner>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedOwner {
    #[serde(rename = "__typename")]
    pub typename: String,
    pub database_id: Option<i64>,
    pub login: String,
    #[serde(default)]
    pub sponsors: Option<TotalCount>,
    #[serde(default)]
    pub sponsoring: Option<TotalCount>,
}

// ===== Relationship listings =====

#[derive(Debug, Deserialize)]
pub struct RelationshipData {
    pub owner: Option<RelationshipOwner>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipOwner {
    pub sponsorships: Option<SponsorshipConnection>,
    #[serde(default)]
    pub sponsors_listing: Option<SponsorsListing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipConnection {
    pub total_count: u32,
    pub page_info: PageInfo,
    #[serde(default)]
    pub nodes: Vec<Option<SponsorshipNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SponsorshipNode {
    /// The account on the other end, null for private sponsorships
    pub account: Option<EntityRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    #[serde(rename = "__typename")]
    pub typename: String,
    pub database_id: Option<i64>,
    pub login: Option<String>,
}

impl EntityRef {
    pub fn to_account_ref(&self) -> Option<AccountRef> {
        let kind = AccountKind::from_typename(&self.typename)?;
        Some(AccountRef::new(self.database_id?, self.login.clone()?, kind))
    }
}

#[derive(Debug, Deserialize)]
pub struct SponsorsListing {
    pub tiers: Option<TierConnection>,
}

#[derive(Debug, Deserialize)]
pub struct TierConnection {
    #[serde(default)]
    pub nodes: Vec<Option<Tier>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub monthly_price_in_dollars: u32,
    #[serde(default)]
    pub is_one_time: bool,
    #[serde(default)]
    pub is_custom_amount: bool,
}

impl RelationshipOwner {
    /// Converts one page of the listing
    pub fn into_page(self) -> RelationshipPage {
        let tier_prices = self
            .sponsors_listing
            .and_then(|listing| listing.tiers)
            .map(|tiers| {
                tiers
                    .nodes
                    .into_iter()
                    .flatten()
                    .filter(|tier| !tier.is_one_time && !tier.is_custom_amount)
                    .map(|tier| tier.monthly_price_in_dollars)
                    .collect()
            })
            .unwrap_or_default();

        let connection = match self.sponsorships {
            Some(connection) => connection,
            None => {
                return RelationshipPage {
                    total_count: Some(0),
                    tier_prices,
                    ..RelationshipPage::default()
                }
            }
        };

        let nodes = connection
            .nodes
            .iter()
            .flatten()
            .filter_map(|node| node.account.as_ref())
            .filter_map(EntityRef::to_account_ref)
            .collect();

        RelationshipPage {
            nodes,
            entry_count: connection.nodes.len(),
            has_more: connection.page_info.has_next_page,
            next_cursor: connection.page_info.end_cursor,
            total_count: Some(connection.total_count),
            tier_prices,
            error: None,
        }
    }
}

// ===== Activity =====

#[derive(Debug, Deserialize)]
pub struct ActivityData {
    pub user: Option<ActivityUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUser {
    pub contributions_collection: Contributions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributions {
    pub total_commit_contributions: u32,
    pub total_pull_request_contributions: u32,
    pub total_issue_contributions: u32,
    pub total_pull_request_review_contributions: u32,
}

impl From<Contributions> for YearlyActivity {
    fn from(c: Contributions) -> Self {
        Self {
            commits: c.total_commit_contributions,
            pull_requests: c.total_pull_request_contributions,
            issues: c.total_issue_contributions,
            reviews: c.total_pull_request_review_contributions,
        }
    }
}

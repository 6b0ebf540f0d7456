//! GraphQL documents sent to the GitHub API
//!
//! Every query aliases its root field to `owner` (or `user`) so one response
//! type covers people and organizations.

use crate::platform::{AccountKind, Direction};

pub const PROFILE_QUERY: &str = r#"
query Profile($login: String!) {
  owner: repositoryOwner(login: $login) {
    __typename
    ... on User {
      databaseId
      login
      name
      location
      company
      bio
      isHireable
      email
      twitterUsername
      avatarUrl
      url
      createdAt
      pronouns
      followers { totalCount }
      following { totalCount }
      repositories(privacy: PUBLIC) { totalCount }
      gists(privacy: PUBLIC) { totalCount }
    }
    ... on Organization {
      databaseId
      login
      name
      location
      description
      email
      twitterUsername
      avatarUrl
      url
      createdAt
      repositories(privacy: PUBLIC) { totalCount }
    }
  }
}
"#;

pub const SEED_QUERY: &str = r#"
query Seed($login: String!) {
  owner: repositoryOwner(login: $login) {
    __typename
    login
    ... on User { databaseId }
    ... on Organization { databaseId }
    ... on Sponsorable {
      sponsors { totalCount }
      sponsoring { totalCount }
    }
  }
}
"#;

pub const ACTIVITY_QUERY: &str = r#"
query Activity($login: String!, $from: DateTime!, $to: DateTime!) {
  user(login: $login) {
    contributionsCollection(from: $from, to: $to) {
      totalCommitContributions
      totalPullRequestContributions
      totalIssueContributions
      totalPullRequestReviewContributions
    }
  }
}
"#;

const ACCOUNT_FIELDS: &str = r#"
          __typename
          ... on User { databaseId login }
          ... on Organization { databaseId login }"#;

const SPONSORS_TEMPLATE: &str = r#"
query Sponsors($login: String!, $first: Int!, $after: String, $firstPage: Boolean!) {
  owner: __ROOT__(login: $login) {
    sponsorships: sponsorshipsAsMaintainer(first: $first, after: $after, includePrivate: true, activeOnly: true) {
      totalCount
      pageInfo { hasNextPage endCursor }
      nodes {
        account: sponsorEntity {__ACCOUNT__
        }
      }
    }
    sponsorsListing @include(if: $firstPage) {
      tiers(first: 100) {
        nodes { monthlyPriceInDollars isOneTime isCustomAmount }
      }
    }
  }
}
"#;

const SPONSORING_TEMPLATE: &str = r#"
query Sponsoring($login: String!, $first: Int!, $after: String) {
  owner: __ROOT__(login: $login) {
    sponsorships: sponsorshipsAsSponsor(first: $first, after: $after, activeOnly: true) {
      totalCount
      pageInfo { hasNextPage endCursor }
      nodes {
        account: sponsorable {__ACCOUNT__
        }
      }
    }
  }
}
"#;

/// Builds the listing query for an account kind and direction
///
/// Organizations are looked up through the `organization` root so their
/// sponsoring listing comes from the org-specific source.
pub fn relationship_query(kind: AccountKind, direction: Direction) -> String {
    let root = match kind {
        AccountKind::Person => "user",
        AccountKind::Organization => "organization",
    };
    let template = match direction {
        Direction::AsSponsored => SPONSORS_TEMPLATE,
        Direction::AsSponsor => SPONSORING_TEMPLATE,
    };

    template
        .replace("__ROOT__", root)
        .replace("__ACCOUNT__", ACCOUNT_FIELDS)
}

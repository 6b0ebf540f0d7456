//! GitHub implementation of the platform interface
//!
//! Talks to the GraphQL API: profiles through `repositoryOwner`, sponsor
//! listings through `sponsorshipsAsMaintainer`, sponsoring listings through
//! `sponsorshipsAsSponsor` and yearly activity through
//! `contributionsCollection`.

mod client;
mod model;
mod queries;

pub use client::GitHubClient;
pub use queries::relationship_query;

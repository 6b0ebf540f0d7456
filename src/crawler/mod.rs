//! Crawler module for the sponsorship graph
//!
//! This module contains the core crawling logic, including:
//! - Rate-limit aware request execution
//! - Cursor pagination of relationship listings
//! - Diff-based edge sync
//! - The per-entry crawl step and the worker loop around it

mod coordinator;
mod fetcher;
mod governor;
mod pagination;
mod seed;
mod step;
mod sync;

#[cfg(test)]
mod fake;

pub use coordinator::{run_crawl, Coordinator, RunMode, RunSummary};
pub use fetcher::{build_http_client, classify_response, execute_request, RawResponse, ResponseClass};
pub use governor::{ApiResponse, RateGovernor};
pub use pagination::{fetch_all, RelationshipListing, BASELINE_TIER_PRICE};
pub use seed::{requeue_skipped, seed_account, SeedOutcome};
pub use step::{crawl_step, StepOutcome};
pub use sync::{sync_edges, SyncOutcome};

//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `FrontierStatus`: lifecycle of a frontier entry (pending, completed, skipped)
//! - `AccountState`: how much we know about an account, and what enrichment it needs

mod account_state;
mod frontier_status;

// Re-export main types
pub use account_state::{AccountState, EnrichAction};
pub use frontier_status::FrontierStatus;

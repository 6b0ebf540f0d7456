//! Statistics generation from the graph database
//!
//! This module provides functionality for extracting and displaying
//! graph and frontier statistics from the storage layer.

use crate::state::FrontierStatus;
use crate::storage::Storage;
use crate::SponsorGraphError;
use std::collections::HashMap;

/// Graph statistics summary
#[derive(Debug, Clone, Default)]
pub struct GraphStatistics {
    /// Total number of accounts, minimal ones included
    pub total_accounts: u64,

    /// Accounts whose profile has been fetched
    pub enriched_accounts: u64,

    /// Count of accounts by kind
    pub accounts_by_kind: HashMap<String, u64>,

    /// Total number of sponsorship edges
    pub total_edges: u64,

    /// Private sponsorships across all accounts
    pub private_sponsors: u64,

    /// Count of frontier entries by status
    pub frontier_by_status: HashMap<FrontierStatus, u64>,
}

impl GraphStatistics {
    /// Frontier entries in the given status
    pub fn frontier_count(&self, status: FrontierStatus) -> u64 {
        self.frontier_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Share of accounts with a fetched profile, in percent
    pub fn enriched_percentage(&self) -> f64 {
        if self.total_accounts > 0 {
            (self.enriched_accounts as f64 / self.total_accounts as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(GraphStatistics)` - Successfully loaded statistics
/// * `Err(SponsorGraphError)` - Failed to query statistics
pub fn load_statistics<S>(storage: &S) -> Result<GraphStatistics, SponsorGraphError>
where
    S: Storage + ?Sized,
{
    Ok(GraphStatistics {
        total_accounts: storage.count_accounts()?,
        enriched_accounts: storage.count_enriched_accounts()?,
        accounts_by_kind: storage.count_accounts_by_kind()?,
        total_edges: storage.count_edges()?,
        private_sponsors: storage.sum_private_sponsors()?,
        frontier_by_status: storage.count_frontier_by_status()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &GraphStatistics) {
    println!("=== Graph Statistics ===\n");

    println!("Accounts:");
    println!("  Total accounts: {}", stats.total_accounts);
    println!(
        "  Enriched: {} ({:.1}%)",
        stats.enriched_accounts,
        stats.enriched_percentage()
    );

    let mut kinds: Vec<_> = stats.accounts_by_kind.iter().collect();
    kinds.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (kind, count) in kinds {
        println!("  {}: {}", kind, count);
    }
    println!();

    println!("Sponsorships:");
    println!("  Public edges: {}", stats.total_edges);
    println!("  Private sponsorships: {}", stats.private_sponsors);
    println!();

    println!("Frontier:");
    for status in FrontierStatus::all_statuses() {
        println!("  {}: {}", status, stats.frontier_count(status));
    }
}

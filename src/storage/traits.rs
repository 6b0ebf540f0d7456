//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::platform::{AccountRef, Direction, ProfileFields};
use crate::state::FrontierStatus;
use crate::storage::{AccountRecord, ActivityRecord, FrontierEntry, RemovalSummary};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    #[error("Frontier entry not found for account {0}")]
    EntryNotFound(i64),

    #[error("Invalid frontier transition for account {account_id}: {from} -> {to}")]
    InvalidTransition {
        account_id: i64,
        from: FrontierStatus,
        to: FrontierStatus,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Returns true if reconnecting may clear the failure
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(e) => crate::is_transient_sqlite(e),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Edge reads and writes used by graph sync
pub trait EdgeStore {
    /// Returns the ids on the other end of every edge of `account_id` in `direction`
    fn neighbor_ids(&self, account_id: i64, direction: Direction) -> StorageResult<HashSet<i64>>;

    /// Applies an edge diff in one transaction
    ///
    /// Accounts in `to_add` that do not exist yet are created in minimal form
    /// before their edges are inserted.
    fn apply_edge_diff(
        &mut self,
        account_id: i64,
        direction: Direction,
        to_add: &[AccountRef],
        to_remove: &[i64],
    ) -> StorageResult<()>;
}

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler.
pub trait Storage: EdgeStore {
    // ===== Account Management =====

    /// Gets an account by platform id
    fn get_account(&self, account_id: i64) -> StorageResult<Option<AccountRecord>>;

    /// Creates minimal accounts for every reference not stored yet
    ///
    /// Existing accounts keep their data; only the handle is refreshed.
    fn ensure_minimal_accounts(&mut self, accounts: &[AccountRef]) -> StorageResult<()>;

    /// Inserts or updates an account from a fetched profile and marks it enriched
    ///
    /// With `refresh` set the stored gender and pronoun fields are left untouched.
    fn save_profile(&mut self, profile: &ProfileFields, refresh: bool) -> StorageResult<()>;

    /// Removes an account and everything hanging off it
    ///
    /// Every account it sponsored gains one private sponsor; all of its edges
    /// and its frontier entry are deleted.
    fn remove_account(&mut self, account_id: i64) -> StorageResult<RemovalSummary>;

    // ===== Frontier Management =====

    /// Adds an account to the frontier; no-op if it already has an entry
    ///
    /// # Returns
    ///
    /// `true` if a new entry was inserted
    fn enqueue(&mut self, account_id: i64, handle: &str, depth: u32) -> StorageResult<bool>;

    /// Adds many accounts at the same depth in one statement
    ///
    /// # Returns
    ///
    /// The number of entries actually inserted
    fn enqueue_many(&mut self, accounts: &[AccountRef], depth: u32) -> StorageResult<usize>;

    /// Returns the oldest pending entry by insertion time, then insertion id
    fn next_pending(&self) -> StorageResult<Option<FrontierEntry>>;

    /// Gets the frontier entry of an account
    fn get_frontier_entry(&self, account_id: i64) -> StorageResult<Option<FrontierEntry>>;

    /// Moves an entry to `to`, rejecting illegal transitions
    fn set_frontier_status(&mut self, account_id: i64, to: FrontierStatus) -> StorageResult<()>;

    /// Marks an entry skipped without touching account data
    fn mark_skipped(&mut self, account_id: i64) -> StorageResult<()> {
        self.set_frontier_status(account_id, FrontierStatus::Skipped)
    }

    /// Deletes the frontier entry of an account
    fn delete_frontier_entry(&mut self, account_id: i64) -> StorageResult<()>;

    /// Re-activates completed entries whose account was last enriched before
    /// `now - max_age_days`
    ///
    /// # Returns
    ///
    /// The number of entries moved back to pending
    fn reactivate_stale(&mut self, max_age_days: u32, now: DateTime<Utc>) -> StorageResult<usize>;

    /// Moves every skipped entry back to pending at depth 1
    fn requeue_skipped(&mut self) -> StorageResult<usize>;

    /// Finishes a crawl step in one transaction
    ///
    /// Marks the entry completed, stamps `last_enriched` and stores the
    /// sponsorship aggregates. A `None` aggregate keeps the stored value.
    fn complete_crawl(
        &mut self,
        account_id: i64,
        private_sponsor_count: Option<u32>,
        min_tier_price: Option<u32>,
        now: DateTime<Utc>,
    ) -> StorageResult<()>;

    // ===== Activity =====

    /// Checks whether activity for `year` is already recorded
    fn has_activity(&self, account_id: i64, year: i32) -> StorageResult<bool>;

    /// Inserts or replaces one activity record
    fn upsert_activity(&mut self, record: &ActivityRecord) -> StorageResult<()>;

    /// Gets all activity records for an account, ordered by year
    fn get_activity(&self, account_id: i64) -> StorageResult<Vec<ActivityRecord>>;

    // ===== Statistics =====

    /// Counts all accounts
    fn count_accounts(&self) -> StorageResult<u64>;

    /// Counts enriched accounts
    fn count_enriched_accounts(&self) -> StorageResult<u64>;

    /// Counts accounts per kind (db string -> count)
    fn count_accounts_by_kind(&self) -> StorageResult<HashMap<String, u64>>;

    /// Counts sponsorship edges
    fn count_edges(&self) -> StorageResult<u64>;

    /// Sums private sponsors over all accounts
    fn sum_private_sponsors(&self) -> StorageResult<u64>;

    /// Counts frontier entries per status
    fn count_frontier_by_status(&self) -> StorageResult<HashMap<FrontierStatus, u64>>;
}

//! Storage module for persisting the sponsorship graph
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Account upserts and cascading removal
//! - Sponsorship edge diffs
//! - Frontier queue management
//! - Yearly activity records

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{EdgeStore, Storage, StorageError, StorageResult};

use crate::platform::{AccountKind, AccountRef, Identity, YearlyActivity};
use crate::state::FrontierStatus;
use chrono::{DateTime, SecondsFormat, Utc};

/// Represents an account in the database
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: i64,
    pub handle: String,
    pub kind: AccountKind,
    pub is_enriched: bool,
    pub last_enriched: Option<String>,
    pub private_sponsor_count: u32,
    pub min_tier_price: Option<u32>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub followers: u32,
    pub following: u32,
    pub created_at: Option<String>,
    pub gender: Option<String>,
    pub has_pronouns: bool,
}

impl AccountRecord {
    /// Builds the record of a freshly discovered, not yet enriched account
    pub fn minimal(id: i64, handle: &str, kind: AccountKind) -> Self {
        Self {
            id,
            handle: handle.to_string(),
            kind,
            is_enriched: false,
            last_enriched: None,
            private_sponsor_count: 0,
            min_tier_price: None,
            name: None,
            location: None,
            followers: 0,
            following: 0,
            created_at: None,
            gender: None,
            has_pronouns: false,
        }
    }

    pub fn account_ref(&self) -> AccountRef {
        AccountRef::new(self.id, self.handle.clone(), self.kind)
    }

    /// Inferred identity fields as stored
    pub fn identity(&self) -> Identity {
        Identity {
            gender: self.gender.clone(),
            has_pronouns: self.has_pronouns,
        }
    }
}

/// Represents a frontier entry in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Insertion id, the tie-break after `created_at`
    pub id: i64,
    pub account_id: i64,
    pub handle: String,
    pub depth: u32,
    pub status: FrontierStatus,
    pub created_at: String,
}

/// Represents one year of activity for an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub account_id: i64,
    pub year: i32,
    pub activity: YearlyActivity,
}

/// What a cascading account removal touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    /// Whether an account row existed
    pub account_removed: bool,

    /// Edges where the removed account was the sponsor
    pub sponsor_edges_removed: usize,

    /// Edges where the removed account was the sponsored side
    pub sponsored_edges_removed: usize,
}

/// Formats a timestamp the way every table stores it
///
/// The fixed precision keeps lexicographic order equal to chronological order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

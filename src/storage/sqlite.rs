//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Batch operations bind their id lists as a JSON array and expand them with
//! `json_each`, so each side of a diff is a single statement.

use crate::platform::{AccountKind, AccountRef, Direction, ProfileFields, YearlyActivity};
use crate::state::FrontierStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{EdgeStore, Storage, StorageError, StorageResult};
use crate::storage::{
    format_timestamp, AccountRecord, ActivityRecord, FrontierEntry, RemovalSummary,
};
use crate::SponsorGraphError;
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const ACCOUNT_COLUMNS: &str = "id, handle, kind, is_enriched, last_enriched, private_sponsor_count,
     min_tier_price, name, location, followers, following, created_at, gender, has_pronouns";

const FRONTIER_COLUMNS: &str = "id, account_id, handle, depth, status, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SponsorGraphError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SponsorGraphError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, SponsorGraphError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountRecord> {
    let kind: String = row.get(2)?;
    Ok(AccountRecord {
        id: row.get(0)?,
        handle: row.get(1)?,
        kind: AccountKind::from_db_string(&kind)
            .ok_or_else(|| rusqlite::Error::InvalidColumnType(2, "kind".to_string(), Type::Text))?,
        is_enriched: row.get(3)?,
        last_enriched: row.get(4)?,
        private_sponsor_count: row.get(5)?,
        min_tier_price: row.get(6)?,
        name: row.get(7)?,
        location: row.get(8)?,
        followers: row.get(9)?,
        following: row.get(10)?,
        created_at: row.get(11)?,
        gender: row.get(12)?,
        has_pronouns: row.get(13)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<FrontierEntry> {
    let status: String = row.get(4)?;
    Ok(FrontierEntry {
        id: row.get(0)?,
        account_id: row.get(1)?,
        handle: row.get(2)?,
        depth: row.get(3)?,
        status: FrontierStatus::from_db_string(&status).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(4, "status".to_string(), Type::Text)
        })?,
        created_at: row.get(5)?,
    })
}

/// Serializes account references for `json_each`
fn accounts_json(accounts: &[AccountRef]) -> StorageResult<String> {
    let rows: Vec<serde_json::Value> = accounts
        .iter()
        .map(|a| {
            serde_json::json!({
                "id": a.id,
                "handle": a.handle,
                "kind": a.kind.to_db_string(),
            })
        })
        .collect();
    Ok(serde_json::to_string(&rows)?)
}

fn insert_minimal_accounts(conn: &Connection, accounts_json: &str) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO accounts (id, handle, kind)
         SELECT json_extract(value, '$.id'), json_extract(value, '$.handle'), json_extract(value, '$.kind')
         FROM json_each(?1) WHERE true
         ON CONFLICT(id) DO UPDATE SET handle = excluded.handle",
        params![accounts_json],
    )?;
    Ok(())
}

/// Validates and applies a frontier transition on an open connection or transaction
fn transition(
    conn: &Connection,
    account_id: i64,
    to: FrontierStatus,
    now: DateTime<Utc>,
) -> StorageResult<()> {
    let current: Option<String> = conn
        .query_row(
            "SELECT status FROM frontier WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )
        .optional()?;

    let current = current.ok_or(StorageError::EntryNotFound(account_id))?;
    let from = FrontierStatus::from_db_string(&current)
        .ok_or_else(|| StorageError::Corrupt(format!("frontier status '{}'", current)))?;

    if !from.can_transition_to(to) {
        return Err(StorageError::InvalidTransition {
            account_id,
            from,
            to,
        });
    }

    if to.is_pending() {
        conn.execute(
            "UPDATE frontier SET status = ?1, created_at = ?2 WHERE account_id = ?3",
            params![to.to_db_string(), format_timestamp(now), account_id],
        )?;
    } else {
        conn.execute(
            "UPDATE frontier SET status = ?1 WHERE account_id = ?2",
            params![to.to_db_string(), account_id],
        )?;
    }
    Ok(())
}

impl EdgeStore for SqliteStorage {
    fn neighbor_ids(&self, account_id: i64, direction: Direction) -> StorageResult<HashSet<i64>> {
        let sql = match direction {
            Direction::AsSponsor => "SELECT sponsored_id FROM sponsorships WHERE sponsor_id = ?1",
            Direction::AsSponsored => "SELECT sponsor_id FROM sponsorships WHERE sponsored_id = ?1",
        };

        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map(params![account_id], |row| row.get(0))?
            .collect::<Result<HashSet<i64>, _>>()?;

        Ok(ids)
    }

    fn apply_edge_diff(
        &mut self,
        account_id: i64,
        direction: Direction,
        to_add: &[AccountRef],
        to_remove: &[i64],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        if !to_remove.is_empty() {
            let ids = serde_json::to_string(to_remove)?;
            let sql = match direction {
                Direction::AsSponsor => {
                    "DELETE FROM sponsorships
                     WHERE sponsor_id = ?1 AND sponsored_id IN (SELECT value FROM json_each(?2))"
                }
                Direction::AsSponsored => {
                    "DELETE FROM sponsorships
                     WHERE sponsored_id = ?1 AND sponsor_id IN (SELECT value FROM json_each(?2))"
                }
            };
            tx.execute(sql, params![account_id, ids])?;
        }

        if !to_add.is_empty() {
            insert_minimal_accounts(&tx, &accounts_json(to_add)?)?;

            let ids = serde_json::to_string(&to_add.iter().map(|a| a.id).collect::<Vec<_>>())?;
            let sql = match direction {
                Direction::AsSponsor => {
                    "INSERT OR IGNORE INTO sponsorships (sponsor_id, sponsored_id)
                     SELECT ?1, value FROM json_each(?2)"
                }
                Direction::AsSponsored => {
                    "INSERT OR IGNORE INTO sponsorships (sponsor_id, sponsored_id)
                     SELECT value, ?1 FROM json_each(?2)"
                }
            };
            tx.execute(sql, params![account_id, ids])?;
        }

        tx.commit()?;
        Ok(())
    }
}

impl Storage for SqliteStorage {
    // ===== Account Management =====

    fn get_account(&self, account_id: i64) -> StorageResult<Option<AccountRecord>> {
        let sql = format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS);
        let account = self
            .conn
            .query_row(&sql, params![account_id], account_from_row)
            .optional()?;
        Ok(account)
    }

    fn ensure_minimal_accounts(&mut self, accounts: &[AccountRef]) -> StorageResult<()> {
        if accounts.is_empty() {
            return Ok(());
        }
        insert_minimal_accounts(&self.conn, &accounts_json(accounts)?)
    }

    fn save_profile(&mut self, profile: &ProfileFields, refresh: bool) -> StorageResult<()> {
        // Inferred identity is written once; a refresh leaves it alone
        let identity_update = if refresh {
            ""
        } else {
            ", gender = excluded.gender, has_pronouns = excluded.has_pronouns"
        };

        let sql = format!(
            "INSERT INTO accounts (
                id, handle, kind, is_enriched, name, location, company, bio, hireable, email,
                twitter_username, avatar_url, profile_url, followers, following, public_repos,
                public_gists, created_at, gender, has_pronouns
             )
             VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
             ON CONFLICT(id) DO UPDATE SET
                handle = excluded.handle,
                kind = excluded.kind,
                is_enriched = 1,
                name = excluded.name,
                location = excluded.location,
                company = excluded.company,
                bio = excluded.bio,
                hireable = excluded.hireable,
                email = excluded.email,
                twitter_username = excluded.twitter_username,
                avatar_url = excluded.avatar_url,
                profile_url = excluded.profile_url,
                followers = excluded.followers,
                following = excluded.following,
                public_repos = excluded.public_repos,
                public_gists = excluded.public_gists,
                created_at = excluded.created_at{}",
            identity_update
        );

        self.conn.execute(
            &sql,
            params![
                profile.id,
                profile.handle,
                profile.kind.to_db_string(),
                profile.name,
                profile.location,
                profile.company,
                profile.bio,
                profile.hireable,
                profile.email,
                profile.twitter_username,
                profile.avatar_url,
                profile.profile_url,
                profile.followers,
                profile.following,
                profile.public_repos,
                profile.public_gists,
                profile.created_at.map(format_timestamp),
                profile.identity.gender,
                profile.identity.has_pronouns,
            ],
        )?;
        Ok(())
    }

    fn remove_account(&mut self, account_id: i64) -> StorageResult<RemovalSummary> {
        let tx = self.conn.transaction()?;

        let account_removed = tx
            .query_row(
                "SELECT 1 FROM accounts WHERE id = ?1",
                params![account_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some();

        // A vanished public sponsor is counted as a private one
        tx.execute(
            "UPDATE accounts SET private_sponsor_count = private_sponsor_count + 1
             WHERE id != ?1 AND id IN (SELECT sponsored_id FROM sponsorships WHERE sponsor_id = ?1)",
            params![account_id],
        )?;

        let sponsor_edges_removed = tx.execute(
            "DELETE FROM sponsorships WHERE sponsor_id = ?1",
            params![account_id],
        )?;
        let sponsored_edges_removed = tx.execute(
            "DELETE FROM sponsorships WHERE sponsored_id = ?1",
            params![account_id],
        )?;

        tx.execute(
            "DELETE FROM account_activity WHERE account_id = ?1",
            params![account_id],
        )?;
        tx.execute(
            "DELETE FROM frontier WHERE account_id = ?1",
            params![account_id],
        )?;
        tx.execute("DELETE FROM accounts WHERE id = ?1", params![account_id])?;

        tx.commit()?;

        Ok(RemovalSummary {
            account_removed,
            sponsor_edges_removed,
            sponsored_edges_removed,
        })
    }

    // ===== Frontier Management =====

    fn enqueue(&mut self, account_id: i64, handle: &str, depth: u32) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO frontier (account_id, handle, depth, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(account_id) DO NOTHING",
            params![
                account_id,
                handle,
                depth,
                FrontierStatus::Pending.to_db_string(),
                format_timestamp(Utc::now())
            ],
        )?;
        Ok(inserted > 0)
    }

    fn enqueue_many(&mut self, accounts: &[AccountRef], depth: u32) -> StorageResult<usize> {
        if accounts.is_empty() {
            return Ok(0);
        }

        let inserted = self.conn.execute(
            "INSERT INTO frontier (account_id, handle, depth, status, created_at)
             SELECT json_extract(value, '$.id'), json_extract(value, '$.handle'), ?2, ?3, ?4
             FROM json_each(?1) WHERE true
             ON CONFLICT(account_id) DO NOTHING",
            params![
                accounts_json(accounts)?,
                depth,
                FrontierStatus::Pending.to_db_string(),
                format_timestamp(Utc::now())
            ],
        )?;
        Ok(inserted)
    }

    fn next_pending(&self) -> StorageResult<Option<FrontierEntry>> {
        let sql = format!(
            "SELECT {} FROM frontier WHERE status = ?1 ORDER BY created_at ASC, id ASC LIMIT 1",
            FRONTIER_COLUMNS
        );
        let entry = self
            .conn
            .query_row(
                &sql,
                params![FrontierStatus::Pending.to_db_string()],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn get_frontier_entry(&self, account_id: i64) -> StorageResult<Option<FrontierEntry>> {
        let sql = format!(
            "SELECT {} FROM frontier WHERE account_id = ?1",
            FRONTIER_COLUMNS
        );
        let entry = self
            .conn
            .query_row(&sql, params![account_id], entry_from_row)
            .optional()?;
        Ok(entry)
    }

    fn set_frontier_status(&mut self, account_id: i64, to: FrontierStatus) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        transition(&tx, account_id, to, Utc::now())?;
        tx.commit()?;
        Ok(())
    }

    fn delete_frontier_entry(&mut self, account_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM frontier WHERE account_id = ?1",
            params![account_id],
        )?;
        Ok(())
    }

    fn reactivate_stale(&mut self, max_age_days: u32, now: DateTime<Utc>) -> StorageResult<usize> {
        let cutoff = now - Duration::days(i64::from(max_age_days));
        let reactivated = self.conn.execute(
            "UPDATE frontier SET status = ?1, created_at = ?2
             WHERE status = ?3
             AND account_id IN (SELECT id FROM accounts WHERE last_enriched < ?4)",
            params![
                FrontierStatus::Pending.to_db_string(),
                format_timestamp(now),
                FrontierStatus::Completed.to_db_string(),
                format_timestamp(cutoff)
            ],
        )?;
        Ok(reactivated)
    }

    fn requeue_skipped(&mut self) -> StorageResult<usize> {
        let requeued = self.conn.execute(
            "UPDATE frontier SET status = ?1, depth = 1, created_at = ?2 WHERE status = ?3",
            params![
                FrontierStatus::Pending.to_db_string(),
                format_timestamp(Utc::now()),
                FrontierStatus::Skipped.to_db_string()
            ],
        )?;
        Ok(requeued)
    }

    fn complete_crawl(
        &mut self,
        account_id: i64,
        private_sponsor_count: Option<u32>,
        min_tier_price: Option<u32>,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE accounts SET
                last_enriched = ?1,
                private_sponsor_count = COALESCE(?2, private_sponsor_count),
                min_tier_price = COALESCE(?3, min_tier_price)
             WHERE id = ?4",
            params![
                format_timestamp(now),
                private_sponsor_count,
                min_tier_price,
                account_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::AccountNotFound(account_id));
        }

        transition(&tx, account_id, FrontierStatus::Completed, now)?;

        tx.commit()?;
        Ok(())
    }

    // ===== Activity =====

    fn has_activity(&self, account_id: i64, year: i32) -> StorageResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM account_activity WHERE account_id = ?1 AND year = ?2",
                params![account_id, year],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn upsert_activity(&mut self, record: &ActivityRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO account_activity (account_id, year, commits, pull_requests, issues, reviews)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(account_id, year) DO UPDATE SET
                commits = excluded.commits,
                pull_requests = excluded.pull_requests,
                issues = excluded.issues,
                reviews = excluded.reviews",
            params![
                record.account_id,
                record.year,
                record.activity.commits,
                record.activity.pull_requests,
                record.activity.issues,
                record.activity.reviews
            ],
        )?;
        Ok(())
    }

    fn get_activity(&self, account_id: i64) -> StorageResult<Vec<ActivityRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, year, commits, pull_requests, issues, reviews
             FROM account_activity WHERE account_id = ?1 ORDER BY year",
        )?;

        let records = stmt
            .query_map(params![account_id], |row| {
                Ok(ActivityRecord {
                    account_id: row.get(0)?,
                    year: row.get(1)?,
                    activity: YearlyActivity {
                        commits: row.get(2)?,
                        pull_requests: row.get(3)?,
                        issues: row.get(4)?,
                        reviews: row.get(5)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // ===== Statistics =====

    fn count_accounts(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_enriched_accounts(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE is_enriched = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_accounts_by_kind(&self) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM accounts GROUP BY kind")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, count) = row?;
            counts.insert(kind, count as u64);
        }

        Ok(counts)
    }

    fn count_edges(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sponsorships", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn sum_private_sponsors(&self) -> StorageResult<u64> {
        let sum: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(private_sponsor_count), 0) FROM accounts",
            [],
            |row| row.get(0),
        )?;
        Ok(sum as u64)
    }

    fn count_frontier_by_status(&self) -> StorageResult<HashMap<FrontierStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM frontier GROUP BY status")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = FrontierStatus::from_db_string(&status) {
                counts.insert(status, count as u64);
            }
        }

        Ok(counts)
    }
}

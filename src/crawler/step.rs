//! One crawl step: process a single frontier entry end to end
//!
//! # Step Flow
//!
//! 1. Skip entries deeper than the depth limit, without any network call
//! 2. Enrich the account according to its [`AccountState`]
//!    - Not found, or the handle now belongs to another id: cascade removal
//!    - Restricted profile: keep the stored one, or drop a never stored entry
//! 3. Fetch sponsors and sponsoring listings concurrently
//! 4. Sync both edge directions
//! 5. Enqueue every neighbour one level deeper
//! 6. Collect yearly activity for people
//! 7. Mark the entry completed together with the sponsorship aggregates

use crate::crawler::pagination::fetch_all;
use crate::crawler::sync::sync_edges;
use crate::platform::{AccountKind, AccountRef, Direction, EnrichOutcome, Platform, ProfileFields, YearlyActivity};
use crate::state::AccountState;
use crate::storage::{ActivityRecord, FrontierEntry, RemovalSummary, Storage};
use crate::Result;
use chrono::{Datelike, Utc};
use std::collections::BTreeMap;

/// What a crawl step did with its entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Deeper than the depth limit
    Skipped,

    /// The account is gone upstream and was removed locally
    Removed(RemovalSummary),

    /// The profile is restricted and was never stored; only the entry was dropped
    Unavailable,

    Completed {
        edges_added: usize,
        edges_removed: usize,
        enqueued: usize,
        activity_years: usize,
    },
}

/// Runs one crawl step for `entry`
///
/// Transient failures are returned as `Err` and leave the entry pending, so
/// the same account is picked up again on a later iteration.
pub async fn crawl_step<S, P>(
    storage: &mut S,
    platform: &P,
    entry: &FrontierEntry,
    max_depth: u32,
) -> Result<StepOutcome>
where
    S: Storage + ?Sized,
    P: Platform + ?Sized,
{
    if entry.depth > max_depth {
        storage.mark_skipped(entry.account_id)?;
        tracing::debug!(
            "Skipping {} at depth {} (max {})",
            entry.handle,
            entry.depth,
            max_depth
        );
        return Ok(StepOutcome::Skipped);
    }

    let record = storage.get_account(entry.account_id)?;
    let state = AccountState::of(record.as_ref());
    let action = state.action();
    let prior = record
        .as_ref()
        .filter(|_| action.refresh)
        .map(|r| r.identity());

    // A neighbour listing may have refreshed the handle since enqueue time
    let handle = record
        .as_ref()
        .map(|r| r.handle.clone())
        .unwrap_or_else(|| entry.handle.clone());

    tracing::debug!("Processing {} ({:?}, depth {})", handle, state, entry.depth);

    let (profile, account) = match platform.enrich(&handle, action.refresh, prior.as_ref()).await? {
        EnrichOutcome::Found(mut profile) if profile.id == entry.account_id => {
            if let Some(prior) = prior {
                profile.identity = prior;
            }
            storage.save_profile(&profile, action.refresh)?;
            let account = profile.account_ref();
            (Some(profile), account)
        }
        EnrichOutcome::Found(profile) => {
            tracing::info!(
                "Handle {} now belongs to account {} instead of {}, removing",
                handle,
                profile.id,
                entry.account_id
            );
            return remove(storage, entry, action.create).map(StepOutcome::Removed);
        }
        EnrichOutcome::NotFound => {
            tracing::info!("Account {} ({}) no longer exists, removing", handle, entry.account_id);
            return remove(storage, entry, action.create).map(StepOutcome::Removed);
        }
        EnrichOutcome::Unavailable => match record.as_ref() {
            Some(record) => {
                tracing::info!("Profile of {} is restricted, keeping the stored one", handle);
                (None, record.account_ref())
            }
            None => {
                tracing::info!("Profile of {} is restricted, dropping the entry", handle);
                storage.delete_frontier_entry(entry.account_id)?;
                return Ok(StepOutcome::Unavailable);
            }
        },
    };

    let (sponsors, sponsoring) = tokio::try_join!(
        fetch_all(platform, &account, Direction::AsSponsored),
        fetch_all(platform, &account, Direction::AsSponsor),
    )?;

    let incoming = sync_edges(storage, account.id, Direction::AsSponsored, &sponsors.neighbors)?;
    let outgoing = sync_edges(storage, account.id, Direction::AsSponsor, &sponsoring.neighbors)?;

    let neighbors: BTreeMap<i64, AccountRef> = sponsors
        .neighbors
        .iter()
        .chain(sponsoring.neighbors.iter())
        .map(|a| (a.id, a.clone()))
        .collect();
    let neighbors: Vec<AccountRef> = neighbors.into_values().collect();
    let enqueued = storage.enqueue_many(&neighbors, entry.depth + 1)?;

    let activity_years = match &profile {
        Some(profile) if account.kind == AccountKind::Person => {
            collect_activity(storage, platform, profile).await?
        }
        _ => 0,
    };

    storage.complete_crawl(
        account.id,
        sponsors.private_count,
        sponsors.min_tier_price,
        Utc::now(),
    )?;

    tracing::info!(
        "Crawled {} at depth {}: {} sponsors, {} sponsoring, {} new in frontier",
        account.handle,
        entry.depth,
        sponsors.neighbors.len(),
        sponsoring.neighbors.len(),
        enqueued
    );

    Ok(StepOutcome::Completed {
        edges_added: incoming.added + outgoing.added,
        edges_removed: incoming.removed + outgoing.removed,
        enqueued,
        activity_years,
    })
}

fn remove<S>(storage: &mut S, entry: &FrontierEntry, never_stored: bool) -> Result<RemovalSummary>
where
    S: Storage + ?Sized,
{
    if never_stored {
        storage.delete_frontier_entry(entry.account_id)?;
        return Ok(RemovalSummary::default());
    }

    let summary = storage.remove_account(entry.account_id)?;
    tracing::info!(
        "Removed account {}: {} outgoing and {} incoming edges",
        entry.account_id,
        summary.sponsor_edges_removed,
        summary.sponsored_edges_removed
    );
    Ok(summary)
}

/// Stores yearly activity from the creation year through the current year
///
/// Past years already stored are kept; the current year is always fetched
/// again. A failing year is logged and the rest carry on.
///
/// # Returns
///
/// The number of years written
async fn collect_activity<S, P>(storage: &mut S, platform: &P, profile: &ProfileFields) -> Result<usize>
where
    S: Storage + ?Sized,
    P: Platform + ?Sized,
{
    let account = profile.account_ref();
    let current_year = Utc::now().year();
    let first_year = profile
        .created_at
        .map(|at| at.year())
        .unwrap_or(current_year)
        .min(current_year);

    let mut written = 0;
    for year in first_year..=current_year {
        if year < current_year && storage.has_activity(account.id, year)? {
            continue;
        }

        let activity = match platform.fetch_yearly_activity(&account, year).await {
            Ok(Some(activity)) => activity,
            Ok(None) => YearlyActivity::default(),
            Err(e) => {
                tracing::warn!("Activity for {} in {} failed: {}", account.handle, year, e);
                continue;
            }
        };

        storage.upsert_activity(&ActivityRecord {
            account_id: account.id,
            year,
            activity,
        })?;
        written += 1;
    }

    Ok(written)
}

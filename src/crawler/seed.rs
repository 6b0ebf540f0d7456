//! Seeding new crawl roots and requeueing skipped entries

use crate::config::validate_handle;
use crate::platform::{AccountRef, Platform};
use crate::storage::Storage;
use crate::Result;

/// Result of seeding one handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// New root at depth 1
    Enqueued(AccountRef),

    /// The account already has a frontier entry
    AlreadyQueued(AccountRef),

    /// The handle is malformed or does not exist upstream
    NotFound,

    /// The account neither has sponsors nor sponsors anyone
    NoSponsorships,
}

/// Adds `handle` to the frontier as a new root
///
/// The handle is resolved upstream first so that unknown accounts and
/// accounts without any sponsorship never enter the frontier.
pub async fn seed_account<S, P>(storage: &mut S, platform: &P, handle: &str) -> Result<SeedOutcome>
where
    S: Storage + ?Sized,
    P: Platform + ?Sized,
{
    let handle = handle.trim().trim_start_matches('@');
    if validate_handle(handle).is_err() {
        tracing::warn!("Refusing to seed malformed handle '{}'", handle);
        return Ok(SeedOutcome::NotFound);
    }

    let candidate = match platform.resolve_seed(handle).await? {
        Some(candidate) => candidate,
        None => {
            tracing::warn!("Seed {} does not exist", handle);
            return Ok(SeedOutcome::NotFound);
        }
    };

    if candidate.sponsors_total == 0 && candidate.sponsoring_total == 0 {
        tracing::warn!("Seed {} has no sponsorships, not enqueued", handle);
        return Ok(SeedOutcome::NoSponsorships);
    }

    let account = candidate.account;
    if !storage.enqueue(account.id, &account.handle, 1)? {
        tracing::info!("Seed {} is already in the frontier", account.handle);
        return Ok(SeedOutcome::AlreadyQueued(account));
    }

    tracing::info!(
        "Seeded {} ({} sponsors, {} sponsoring)",
        account.handle,
        candidate.sponsors_total,
        candidate.sponsoring_total
    );
    Ok(SeedOutcome::Enqueued(account))
}

/// Turns every skipped entry into a pending root at depth 1
pub fn requeue_skipped<S>(storage: &mut S) -> Result<usize>
where
    S: Storage + ?Sized,
{
    let requeued = storage.requeue_skipped()?;
    tracing::info!("Requeued {} skipped entries as new roots", requeued);
    Ok(requeued)
}

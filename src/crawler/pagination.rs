//! Paginated relationship fetcher
//!
//! Walks a cursor-paginated listing until it is exhausted or something goes
//! wrong, keeping whatever was collected before the failure.

use crate::platform::{AccountRef, Direction, Platform};
use crate::Result;
use std::collections::HashSet;

/// Minimum tier price recorded when an account has no public recurring tier
pub const BASELINE_TIER_PRICE: u32 = 1;

/// Everything collected from one relationship listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipListing {
    /// Named neighbours in listing order, without duplicates
    pub neighbors: Vec<AccountRef>,

    /// Anonymous entries; only known when the listing completed
    pub private_count: Option<u32>,

    /// Cheapest public monthly tier, sponsors listings only
    pub min_tier_price: Option<u32>,

    /// Whether the walk reached the last page
    pub complete: bool,

    pub pages: u32,
}

/// Fetches every page of `account`'s listing in `direction`
///
/// # Stop Conditions
///
/// | Condition | Complete |
/// |-----------|----------|
/// | `has_more` is false | yes |
/// | blocked or legally restricted | no |
/// | page reports a schema error | no |
/// | page with zero entries but more announced | no |
/// | cursor missing or not advancing | no |
///
/// Transport failures are returned as `Err` and abandon the listing.
pub async fn fetch_all<P>(
    platform: &P,
    account: &AccountRef,
    direction: Direction,
) -> Result<RelationshipListing>
where
    P: Platform + ?Sized,
{
    let mut listing = RelationshipListing::default();
    let mut seen = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut total_count = None;

    loop {
        let page = match platform
            .fetch_relationship_page(account, direction, cursor.as_deref())
            .await?
        {
            Some(page) => page,
            None => {
                tracing::debug!(
                    "{} listing of {} is blocked, keeping {} nodes",
                    direction.label(),
                    account.handle,
                    listing.neighbors.len()
                );
                break;
            }
        };
        listing.pages += 1;

        if listing.pages == 1 {
            total_count = page.total_count;
            // A failed first page carries no tier data
            if direction == Direction::AsSponsored && page.error.is_none() {
                listing.min_tier_price = Some(
                    page.tier_prices
                        .iter()
                        .copied()
                        .min()
                        .unwrap_or(BASELINE_TIER_PRICE),
                );
            }
        }

        for node in page.nodes {
            if seen.insert(node.id) {
                listing.neighbors.push(node);
            }
        }

        if let Some(error) = page.error {
            tracing::warn!(
                "{} listing of {} failed on page {}: {}; keeping {} nodes",
                direction.label(),
                account.handle,
                listing.pages,
                error,
                listing.neighbors.len()
            );
            break;
        }

        if !page.has_more {
            listing.complete = true;
            break;
        }

        if page.entry_count == 0 {
            tracing::warn!(
                "{} listing of {} returned an empty page with more announced",
                direction.label(),
                account.handle
            );
            break;
        }

        match page.next_cursor {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            _ => {
                tracing::warn!(
                    "{} listing of {} stopped: cursor did not advance",
                    direction.label(),
                    account.handle
                );
                break;
            }
        }
    }

    if listing.complete && direction == Direction::AsSponsored {
        let named = listing.neighbors.len() as u32;
        listing.private_count = total_count.map(|total| total.saturating_sub(named));
    }

    Ok(listing)
}

//! Scriptable in-memory platform for unit tests

use crate::platform::{
    AccountKind, AccountRef, Direction, EnrichOutcome, Identity, Platform, ProfileFields,
    RelationshipPage, SeedCandidate, YearlyActivity,
};
use crate::{Result, SponsorGraphError};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub(crate) fn person(id: i64, handle: &str) -> AccountRef {
    AccountRef::new(id, handle, AccountKind::Person)
}

pub(crate) fn org(id: i64, handle: &str) -> AccountRef {
    AccountRef::new(id, handle, AccountKind::Organization)
}

/// Builds a profile created on January 1st of `created_year`
pub(crate) fn profile(account: &AccountRef, created_year: i32) -> ProfileFields {
    ProfileFields {
        id: account.id,
        handle: account.handle.clone(),
        kind: account.kind,
        name: Some(format!("{} display", account.handle)),
        location: None,
        company: None,
        bio: None,
        hireable: None,
        email: None,
        twitter_username: None,
        avatar_url: None,
        profile_url: Some(format!("https://github.com/{}", account.handle)),
        followers: 1,
        following: 1,
        public_repos: 1,
        public_gists: 0,
        created_at: Utc.with_ymd_and_hms(created_year, 1, 1, 0, 0, 0).single(),
        identity: Identity {
            gender: Some("Unknown".to_string()),
            has_pronouns: false,
        },
    }
}

/// Builds standard pages whose cursors are page indexes
pub(crate) fn pages(
    chunks: Vec<Vec<AccountRef>>,
    total_count: Option<u32>,
    tier_prices: Vec<u32>,
) -> Vec<RelationshipPage> {
    let last = chunks.len().saturating_sub(1);
    chunks
        .into_iter()
        .enumerate()
        .map(|(index, nodes)| RelationshipPage {
            entry_count: nodes.len(),
            nodes,
            has_more: index < last,
            next_cursor: (index < last).then(|| (index + 1).to_string()),
            total_count,
            tier_prices: if index == 0 { tier_prices.clone() } else { Vec::new() },
            error: None,
        })
        .collect()
}

#[derive(Default)]
pub(crate) struct FakePlatform {
    profiles: Mutex<HashMap<String, ProfileFields>>,
    listings: Mutex<HashMap<(i64, Direction), Vec<RelationshipPage>>>,
    blocked: Mutex<HashSet<(i64, Direction)>>,
    restricted: Mutex<HashSet<String>>,
    activity: Mutex<HashMap<(i64, i32), YearlyActivity>>,
    failing_years: Mutex<HashSet<i32>>,
    enrich_failures: AtomicU32,
    enrich_calls: AtomicU32,
    page_calls: AtomicU32,
    activity_calls: AtomicU32,
    activity_years: Mutex<Vec<i32>>,
}

impl FakePlatform {
    pub(crate) fn add_profile(&self, profile: ProfileFields) {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.handle.to_lowercase(), profile);
    }

    pub(crate) fn set_pages(&self, id: i64, direction: Direction, pages: Vec<RelationshipPage>) {
        self.listings.lock().unwrap().insert((id, direction), pages);
    }

    pub(crate) fn set_listing(
        &self,
        id: i64,
        direction: Direction,
        chunks: Vec<Vec<AccountRef>>,
        total_count: Option<u32>,
        tier_prices: Vec<u32>,
    ) {
        self.set_pages(id, direction, pages(chunks, total_count, tier_prices));
    }

    pub(crate) fn block(&self, id: i64, direction: Direction) {
        self.blocked.lock().unwrap().insert((id, direction));
    }

    /// Makes enrichment of `handle` report a restricted profile
    pub(crate) fn restrict_profile(&self, handle: &str) {
        self.restricted.lock().unwrap().insert(handle.to_lowercase());
    }

    pub(crate) fn set_activity(&self, id: i64, year: i32, activity: YearlyActivity) {
        self.activity.lock().unwrap().insert((id, year), activity);
    }

    pub(crate) fn fail_activity_year(&self, year: i32) {
        self.failing_years.lock().unwrap().insert(year);
    }

    /// Makes the next `times` enrich calls fail with a transient error
    pub(crate) fn fail_enrich(&self, times: u32) {
        self.enrich_failures.store(times, Ordering::SeqCst);
    }

    pub(crate) fn enrich_calls(&self) -> u32 {
        self.enrich_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn page_calls(&self) -> u32 {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn activity_calls(&self) -> u32 {
        self.activity_calls.load(Ordering::SeqCst)
    }

    /// Years requested from the activity source, in call order
    pub(crate) fn activity_years(&self) -> Vec<i32> {
        self.activity_years.lock().unwrap().clone()
    }

    pub(crate) fn total_calls(&self) -> u32 {
        self.enrich_calls() + self.page_calls() + self.activity_calls()
    }

    fn listing_total(&self, id: i64, direction: Direction) -> u32 {
        self.listings
            .lock()
            .unwrap()
            .get(&(id, direction))
            .and_then(|pages| pages.first())
            .map(|page| page.total_count.unwrap_or(page.entry_count as u32))
            .unwrap_or(0)
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn resolve_seed(&self, handle: &str) -> Result<Option<SeedCandidate>> {
        let account = match self.profiles.lock().unwrap().get(&handle.to_lowercase()) {
            Some(profile) => profile.account_ref(),
            None => return Ok(None),
        };

        Ok(Some(SeedCandidate {
            sponsors_total: self.listing_total(account.id, Direction::AsSponsored),
            sponsoring_total: self.listing_total(account.id, Direction::AsSponsor),
            account,
        }))
    }

    async fn enrich(
        &self,
        handle: &str,
        refresh: bool,
        prior: Option<&Identity>,
    ) -> Result<EnrichOutcome> {
        self.enrich_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .enrich_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SponsorGraphError::Api {
                url: "fake://enrich".to_string(),
                status: 503,
                message: "unavailable".to_string(),
            });
        }

        if self.restricted.lock().unwrap().contains(&handle.to_lowercase()) {
            return Ok(EnrichOutcome::Unavailable);
        }

        let found = self.profiles.lock().unwrap().get(&handle.to_lowercase()).cloned();
        Ok(match found {
            Some(mut profile) => {
                if refresh {
                    profile.identity = prior.cloned().unwrap_or_default();
                }
                EnrichOutcome::Found(profile)
            }
            None => EnrichOutcome::NotFound,
        })
    }

    async fn fetch_relationship_page(
        &self,
        account: &AccountRef,
        direction: Direction,
        cursor: Option<&str>,
    ) -> Result<Option<RelationshipPage>> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);

        if self.blocked.lock().unwrap().contains(&(account.id, direction)) {
            return Ok(None);
        }

        let index = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let page = self
            .listings
            .lock()
            .unwrap()
            .get(&(account.id, direction))
            .and_then(|pages| pages.get(index).cloned())
            .unwrap_or(RelationshipPage {
                total_count: Some(0),
                ..RelationshipPage::default()
            });

        Ok(Some(page))
    }

    async fn fetch_yearly_activity(
        &self,
        account: &AccountRef,
        year: i32,
    ) -> Result<Option<YearlyActivity>> {
        self.activity_calls.fetch_add(1, Ordering::SeqCst);
        self.activity_years.lock().unwrap().push(year);

        if self.failing_years.lock().unwrap().contains(&year) {
            return Err(SponsorGraphError::Api {
                url: "fake://activity".to_string(),
                status: 502,
                message: format!("no activity for {}", year),
            });
        }

        Ok(self.activity.lock().unwrap().get(&(account.id, year)).copied())
    }
}

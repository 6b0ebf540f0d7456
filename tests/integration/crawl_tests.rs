//! Integration tests for the crawler
//!
//! The crawl scenarios drive the coordinator against a scripted platform and
//! an on-disk database. The client tests use wiremock to stand in for the
//! GitHub GraphQL endpoint.

use async_trait::async_trait;
use chrono::Utc;
use sponsor_graph::config::{ApiConfig, Config, CrawlerConfig, OutputConfig};
use sponsor_graph::crawler::{crawl_step, Coordinator, RunMode, SeedOutcome, StepOutcome};
use sponsor_graph::github::GitHubClient;
use sponsor_graph::platform::{
    AccountKind, AccountRef, Direction, EnrichOutcome, Identity, Platform, ProfileFields,
    RelationshipPage, SeedCandidate, YearlyActivity,
};
use sponsor_graph::state::FrontierStatus;
use sponsor_graph::storage::{EdgeStore, SqliteStorage, Storage};
use sponsor_graph::SponsorGraphError;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Platform answering from in-memory tables, one page per listing
#[derive(Default)]
struct ScriptedPlatform {
    profiles: Mutex<HashMap<String, ProfileFields>>,
    listings: Mutex<HashMap<(i64, Direction), Vec<AccountRef>>>,
    calls: AtomicUsize,
}

impl ScriptedPlatform {
    fn add(&self, account: &AccountRef) {
        self.profiles
            .lock()
            .unwrap()
            .insert(account.handle.clone(), profile_of(account));
    }

    fn list(&self, account: &AccountRef, direction: Direction, neighbors: &[&AccountRef]) {
        self.listings.lock().unwrap().insert(
            (account.id, direction),
            neighbors.iter().map(|a| (*a).clone()).collect(),
        );
    }

    fn listing(&self, account_id: i64, direction: Direction) -> Vec<AccountRef> {
        self.listings
            .lock()
            .unwrap()
            .get(&(account_id, direction))
            .cloned()
            .unwrap_or_default()
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Platform for ScriptedPlatform {
    async fn resolve_seed(&self, handle: &str) -> sponsor_graph::Result<Option<SeedCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let account = match self.profiles.lock().unwrap().get(handle) {
            Some(profile) => profile.account_ref(),
            None => return Ok(None),
        };

        Ok(Some(SeedCandidate {
            sponsors_total: self.listing(account.id, Direction::AsSponsored).len() as u32,
            sponsoring_total: self.listing(account.id, Direction::AsSponsor).len() as u32,
            account,
        }))
    }

    async fn enrich(
        &self,
        handle: &str,
        refresh: bool,
        prior: Option<&Identity>,
    ) -> sponsor_graph::Result<EnrichOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut profile = match self.profiles.lock().unwrap().get(handle) {
            Some(profile) => profile.clone(),
            None => return Ok(EnrichOutcome::NotFound),
        };
        if refresh {
            profile.identity = prior.cloned().unwrap_or_default();
        }
        Ok(EnrichOutcome::Found(profile))
    }

    async fn fetch_relationship_page(
        &self,
        account: &AccountRef,
        direction: Direction,
        _cursor: Option<&str>,
    ) -> sponsor_graph::Result<Option<RelationshipPage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let nodes = self.listing(account.id, direction);

        Ok(Some(RelationshipPage {
            entry_count: nodes.len(),
            total_count: Some(nodes.len() as u32),
            has_more: false,
            next_cursor: None,
            tier_prices: vec![],
            error: None,
            nodes,
        }))
    }

    async fn fetch_yearly_activity(
        &self,
        _account: &AccountRef,
        _year: i32,
    ) -> sponsor_graph::Result<Option<YearlyActivity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(YearlyActivity {
            commits: 12,
            ..YearlyActivity::default()
        }))
    }
}

fn person(id: i64, handle: &str) -> AccountRef {
    AccountRef::new(id, handle, AccountKind::Person)
}

fn profile_of(account: &AccountRef) -> ProfileFields {
    ProfileFields {
        id: account.id,
        handle: account.handle.clone(),
        kind: account.kind,
        name: Some(account.handle.to_uppercase()),
        location: None,
        company: None,
        bio: None,
        hireable: Some(false),
        email: None,
        twitter_username: None,
        avatar_url: None,
        profile_url: Some(format!("https://github.com/{}", account.handle)),
        followers: 3,
        following: 1,
        public_repos: 2,
        public_gists: 0,
        // Current year only, so one activity call per person
        created_at: Some(Utc::now()),
        identity: Identity::default(),
    }
}

/// Creates a test configuration with a database inside `dir`
fn create_test_config(dir: &TempDir, max_depth: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_depth,
            staleness_days: 14,
            stale_sweep_interval_secs: 3600,
            idle_wait_secs: 1,
            step_delay_ms: 0,
            error_backoff_secs: 1,
        },
        api: api_config("http://127.0.0.1:1/graphql", None),
        output: OutputConfig {
            database_path: dir.path().join("graph.db").to_string_lossy().into_owned(),
        },
        seeds: vec![],
    }
}

fn api_config(graphql_url: &str, token_file: Option<&Path>) -> ApiConfig {
    ApiConfig {
        graphql_url: graphql_url.to_string(),
        token_env: "SPONSOR_GRAPH_TEST_TOKEN_UNSET".to_string(),
        token_file: token_file.map(|p| p.to_string_lossy().into_owned()),
        page_size: 100,
        rate_limit_buffer_secs: 0,
        user_agent: "sponsor-graph/test".to_string(),
    }
}

fn ids(set: &HashSet<i64>) -> Vec<i64> {
    let mut ids: Vec<_> = set.iter().copied().collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_seed_crawl_creates_minimal_neighbors() {
    let dir = TempDir::new().unwrap();
    let (alice, bob, carol) = (person(1, "alice"), person(2, "bob"), person(3, "carol"));

    let platform = Arc::new(ScriptedPlatform::default());
    platform.add(&alice);
    platform.list(&alice, Direction::AsSponsored, &[&bob, &carol]);

    // bob and carol have no profile upstream; the depth limit stops before them
    let mut coordinator = Coordinator::new(create_test_config(&dir, 1), platform.clone()).unwrap();
    let outcomes = coordinator.seed(["alice"]).await.unwrap();
    assert_eq!(outcomes, vec![SeedOutcome::Enqueued(alice.clone())]);

    coordinator.run(RunMode::UntilIdle).await.unwrap();

    let storage = coordinator.storage();
    assert_eq!(
        storage.get_frontier_entry(alice.id).unwrap().unwrap().status,
        FrontierStatus::Completed
    );
    for neighbor in [&bob, &carol] {
        let record = storage.get_account(neighbor.id).unwrap().unwrap();
        assert!(!record.is_enriched);

        let entry = storage.get_frontier_entry(neighbor.id).unwrap().unwrap();
        assert_eq!(entry.depth, 2);
        assert_eq!(entry.status, FrontierStatus::Skipped);
    }
    assert_eq!(
        ids(&storage.neighbor_ids(alice.id, Direction::AsSponsored).unwrap()),
        vec![2, 3]
    );
    assert!(storage
        .neighbor_ids(alice.id, Direction::AsSponsor)
        .unwrap()
        .is_empty());

    let record = storage.get_account(alice.id).unwrap().unwrap();
    assert!(record.is_enriched);
    assert_eq!(record.private_sponsor_count, 0);
    assert_eq!(storage.get_activity(alice.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_recrawl_applies_edge_diff() {
    let dir = TempDir::new().unwrap();
    let (alice, bob, carol, dave) = (
        person(1, "alice"),
        person(2, "bob"),
        person(3, "carol"),
        person(4, "dave"),
    );

    let platform = Arc::new(ScriptedPlatform::default());
    platform.add(&alice);
    platform.list(&alice, Direction::AsSponsored, &[&bob, &carol]);

    let mut coordinator = Coordinator::new(create_test_config(&dir, 1), platform.clone()).unwrap();
    coordinator.seed(["alice"]).await.unwrap();
    coordinator.run(RunMode::UntilIdle).await.unwrap();

    platform.list(&alice, Direction::AsSponsored, &[&carol, &dave]);
    let mut storage = SqliteStorage::new(&dir.path().join("graph.db")).unwrap();
    let reactivated = storage
        .reactivate_stale(0, Utc::now() + chrono::Duration::seconds(1))
        .unwrap();
    assert_eq!(reactivated, 1);

    let summary = coordinator.run(RunMode::UntilIdle).await.unwrap();
    assert_eq!(summary.completed, 1);

    let storage = coordinator.storage();
    assert_eq!(
        ids(&storage.neighbor_ids(alice.id, Direction::AsSponsored).unwrap()),
        vec![3, 4]
    );
    assert!(storage
        .neighbor_ids(bob.id, Direction::AsSponsor)
        .unwrap()
        .is_empty());
    assert_eq!(
        ids(&storage.neighbor_ids(carol.id, Direction::AsSponsor).unwrap()),
        vec![1]
    );
    assert_eq!(
        storage.get_frontier_entry(dave.id).unwrap().unwrap().depth,
        2
    );
}

#[tokio::test]
async fn test_entry_beyond_depth_is_skipped_without_calls() {
    let dir = TempDir::new().unwrap();
    let platform = Arc::new(ScriptedPlatform::default());
    platform.add(&person(5, "eve"));

    let mut storage = SqliteStorage::new(&dir.path().join("graph.db")).unwrap();
    storage.enqueue(5, "eve", 5).unwrap();

    let mut coordinator = Coordinator::new(create_test_config(&dir, 4), platform.clone()).unwrap();
    let summary = coordinator.run(RunMode::UntilIdle).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(platform.calls(), 0);
    assert_eq!(
        coordinator
            .storage()
            .get_frontier_entry(5)
            .unwrap()
            .unwrap()
            .status,
        FrontierStatus::Skipped
    );
}

#[tokio::test]
async fn test_vanished_account_cascades() {
    let dir = TempDir::new().unwrap();
    let (alice, bob, carol) = (person(1, "alice"), person(2, "bob"), person(3, "carol"));

    // bob sponsors both seeds but has no profile upstream
    let platform = Arc::new(ScriptedPlatform::default());
    platform.add(&alice);
    platform.add(&carol);
    platform.list(&alice, Direction::AsSponsored, &[&bob]);
    platform.list(&carol, Direction::AsSponsored, &[&bob]);

    let mut coordinator = Coordinator::new(create_test_config(&dir, 2), platform.clone()).unwrap();
    coordinator.seed(["alice", "carol"]).await.unwrap();
    let summary = coordinator.run(RunMode::UntilIdle).await.unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.removed, 1);

    let storage = coordinator.storage();
    assert!(storage.get_account(bob.id).unwrap().is_none());
    assert!(storage.get_frontier_entry(bob.id).unwrap().is_none());
    assert!(storage
        .neighbor_ids(bob.id, Direction::AsSponsor)
        .unwrap()
        .is_empty());

    for seed in [&alice, &carol] {
        let record = storage.get_account(seed.id).unwrap().unwrap();
        assert_eq!(record.private_sponsor_count, 1);
        assert!(storage
            .neighbor_ids(seed.id, Direction::AsSponsored)
            .unwrap()
            .is_empty());
    }
}

#[tokio::test]
async fn test_seed_without_sponsorships_is_rejected() {
    let dir = TempDir::new().unwrap();
    let platform = Arc::new(ScriptedPlatform::default());
    platform.add(&person(7, "loner"));

    let mut coordinator = Coordinator::new(create_test_config(&dir, 4), platform.clone()).unwrap();
    let outcomes = coordinator.seed(["loner", "nobody"]).await.unwrap();

    assert_eq!(
        outcomes,
        vec![SeedOutcome::NoSponsorships, SeedOutcome::NotFound]
    );
    assert!(coordinator.storage().next_pending().unwrap().is_none());
}

// ===== GitHub client against a mock endpoint =====

fn token_file(dir: &TempDir, token: &str) -> std::path::PathBuf {
    let path = dir.path().join("token");
    std::fs::write(&path, format!("{}\n", token)).unwrap();
    path
}

async fn client_for(server: &MockServer, dir: &TempDir) -> GitHubClient {
    let path = token_file(dir, "secret-token");
    let config = api_config(&format!("{}/graphql", server.uri()), Some(&path));
    let client = GitHubClient::new(&config).unwrap();
    client.refresh_session().await.unwrap();
    client
}

const SEED_RESPONSE: &str = r#"{
    "data": {
        "owner": {
            "__typename": "User",
            "databaseId": 1,
            "login": "alice",
            "sponsors": { "totalCount": 2 },
            "sponsoring": { "totalCount": 0 }
        }
    }
}"#;

#[tokio::test]
async fn test_client_retries_after_rate_limit() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let reset = (Utc::now().timestamp() - 1).to_string();
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset.as_str())
                .set_body_string(r#"{"message":"API rate limit exceeded"}"#),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEED_RESPONSE))
        .mount(&server)
        .await;

    let client = client_for(&server, &dir).await;
    let candidate = client.resolve_seed("alice").await.unwrap().unwrap();

    assert_eq!(candidate.account, person(1, "alice"));
    assert_eq!(candidate.sponsors_total, 2);
    assert_eq!(client.governor().suspension_count(), 1);
}

#[tokio::test]
async fn test_client_sends_token_from_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_string_contains("repositoryOwner"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEED_RESPONSE))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &dir).await;
    assert!(client.resolve_seed("alice").await.unwrap().is_some());
}

#[tokio::test]
async fn test_client_blocked_listing_is_none() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(451).set_body_string("Unavailable For Legal Reasons"))
        .mount(&server)
        .await;

    let client = client_for(&server, &dir).await;
    let page = client
        .fetch_relationship_page(&person(1, "alice"), Direction::AsSponsored, None)
        .await
        .unwrap();

    assert!(page.is_none());
}

#[tokio::test]
async fn test_client_missing_profile_is_not_found() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "data": { "owner": null },
                "errors": [{ "type": "NOT_FOUND", "message": "Could not resolve to a RepositoryOwner" }]
            }"#,
        ))
        .mount(&server)
        .await;

    let client = client_for(&server, &dir).await;
    let outcome = client.enrich("ghost", false, None).await.unwrap();

    assert_eq!(outcome, EnrichOutcome::NotFound);
}

#[tokio::test]
async fn test_client_restricted_profile_keeps_stored_account() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("query Profile"))
        .respond_with(ResponseTemplate::new(451).set_body_string("Unavailable For Legal Reasons"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("sponsorshipsAsMaintainer"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "data": { "owner": {
                    "sponsorships": {
                        "totalCount": 1,
                        "pageInfo": { "hasNextPage": false, "endCursor": null },
                        "nodes": [{ "account": { "__typename": "User", "databaseId": 2, "login": "bob" } }]
                    },
                    "sponsorsListing": { "tiers": { "nodes": [{ "monthlyPriceInDollars": 10 }] } }
                } }
            }"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("sponsorshipsAsSponsor"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "data": { "owner": {
                    "sponsorships": {
                        "totalCount": 0,
                        "pageInfo": { "hasNextPage": false, "endCursor": null },
                        "nodes": []
                    }
                } }
            }"#,
        ))
        .mount(&server)
        .await;

    let client = client_for(&server, &dir).await;
    assert_eq!(
        client.enrich("alice", true, None).await.unwrap(),
        EnrichOutcome::Unavailable
    );

    let alice = person(1, "alice");
    let mut storage = SqliteStorage::new(&dir.path().join("graph.db")).unwrap();
    storage.save_profile(&profile_of(&alice), false).unwrap();
    storage
        .apply_edge_diff(1, Direction::AsSponsored, &[person(2, "bob")], &[])
        .unwrap();
    storage.enqueue(1, "alice", 0).unwrap();

    let entry = storage.get_frontier_entry(1).unwrap().unwrap();
    let outcome = crawl_step(&mut storage, &client, &entry, 3).await.unwrap();

    assert!(matches!(
        outcome,
        StepOutcome::Completed {
            edges_added: 0,
            edges_removed: 0,
            ..
        }
    ));
    let stored = storage.get_account(1).unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("ALICE"));
    assert_eq!(stored.min_tier_price, Some(10));
    assert_eq!(ids(&storage.neighbor_ids(1, Direction::AsSponsored).unwrap()), vec![2]);
    assert_eq!(storage.get_account(2).unwrap().unwrap().private_sponsor_count, 0);
    assert_eq!(
        storage.get_frontier_entry(1).unwrap().unwrap().status,
        FrontierStatus::Completed
    );
}

#[tokio::test]
async fn test_client_error_without_data_is_transient() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "data": null,
                "errors": [{ "message": "Something went wrong while executing your query" }]
            }"#,
        ))
        .mount(&server)
        .await;

    let client = client_for(&server, &dir).await;
    let err = client.enrich("alice", false, None).await.unwrap_err();

    assert!(matches!(err, SponsorGraphError::GraphQl { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_client_server_error_is_transient() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let client = client_for(&server, &dir).await;
    let err = client.enrich("alice", false, None).await.unwrap_err();

    assert!(matches!(err, SponsorGraphError::Api { status: 502, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_client_without_token_fails() {
    let config = api_config("http://127.0.0.1:1/graphql", None);
    let client = GitHubClient::new(&config).unwrap();

    let err = client.refresh_session().await.unwrap_err();
    assert!(matches!(err, SponsorGraphError::Credential(_)));

    let err = client.resolve_seed("alice").await.unwrap_err();
    assert!(matches!(err, SponsorGraphError::Credential(_)));
}

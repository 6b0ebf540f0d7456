//! GitHub GraphQL client
//!
//! Implements [`Platform`] on top of the GraphQL API. Every request runs
//! through the client's [`RateGovernor`], so the crawl engine never sees a
//! rate-limit response.

use crate::config::ApiConfig;
use crate::crawler::{build_http_client, execute_request, ApiResponse, RateGovernor};
use crate::github::model::{
    ActivityData, GraphQlResponse, OwnerData, RelationshipData, SeedData,
};
use crate::github::queries::{relationship_query, ACTIVITY_QUERY, PROFILE_QUERY, SEED_QUERY};
use crate::platform::{
    AccountKind, AccountRef, Direction, EnrichOutcome, Identity, Platform, RelationshipPage,
    SeedCandidate, YearlyActivity,
};
use crate::{Result, SponsorGraphError};
use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

/// Fallback wait when a GraphQL rate-limit error comes without a reset header
const GRAPHQL_RESET_FALLBACK_SECS: i64 = 60;

#[derive(Debug, Default)]
struct Session {
    token: Option<String>,

    /// Modification time of the token file the current token came from
    file_modified: Option<SystemTime>,
}

/// GitHub implementation of [`Platform`]
pub struct GitHubClient {
    http: Client,
    endpoint: String,
    page_size: u32,
    token_env: String,
    token_file: Option<PathBuf>,
    session: Mutex<Session>,
    governor: RateGovernor,
}

impl GitHubClient {
    /// Creates a client from the API configuration
    ///
    /// No token is loaded yet; call [`Platform::refresh_session`] before the
    /// first request.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config)?,
            endpoint: config.graphql_url.clone(),
            page_size: config.page_size,
            token_env: config.token_env.clone(),
            token_file: config.token_file.as_ref().map(PathBuf::from),
            session: Mutex::new(Session::default()),
            governor: RateGovernor::new(Duration::from_secs(config.rate_limit_buffer_secs)),
        })
    }

    /// The governor every request goes through
    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn token(&self) -> Result<String> {
        self.lock_session().token.clone().ok_or_else(|| {
            SponsorGraphError::Credential("no API token loaded".to_string())
        })
    }

    /// Posts a GraphQL document through the rate governor
    ///
    /// # Returns
    ///
    /// * `Ok(Some(response))` - The API answered; the body may still carry errors
    /// * `Ok(None)` - The resource is blocked or legally restricted
    async fn post<T>(&self, query: &str, variables: Value) -> Result<Option<GraphQlResponse<T>>>
    where
        T: DeserializeOwned,
    {
        let token = self.token()?;
        let payload = json!({ "query": query, "variables": variables });
        let http = &self.http;
        let endpoint = self.endpoint.as_str();

        self.governor
            .execute(|| {
                let request = http.post(endpoint).bearer_auth(&token).json(&payload);
                async move {
                    let raw = match execute_request(request, endpoint).await? {
                        ApiResponse::Success(raw) => raw,
                        ApiResponse::QuotaExhausted { reset_epoch } => {
                            return Ok(ApiResponse::QuotaExhausted { reset_epoch })
                        }
                        ApiResponse::Blocked => return Ok(ApiResponse::Blocked),
                    };

                    let response: GraphQlResponse<T> = serde_json::from_str(&raw.body)?;
                    if response.is_rate_limited() {
                        let reset_epoch = raw
                            .reset_epoch
                            .unwrap_or_else(|| Utc::now().timestamp() + GRAPHQL_RESET_FALLBACK_SECS);
                        return Ok(ApiResponse::QuotaExhausted { reset_epoch });
                    }

                    Ok(ApiResponse::Success(response))
                }
            })
            .await
    }

    fn graphql_error(&self, message: &str) -> SponsorGraphError {
        SponsorGraphError::GraphQl {
            url: self.endpoint.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Platform for GitHubClient {
    async fn refresh_session(&self) -> Result<()> {
        let path = match &self.token_file {
            Some(path) => path,
            None => {
                let token = std::env::var(&self.token_env).map_err(|_| {
                    SponsorGraphError::Credential(format!("{} is not set", self.token_env))
                })?;
                self.lock_session().token = Some(token);
                return Ok(());
            }
        };

        let modified = tokio::fs::metadata(path).await?.modified()?;
        if self.lock_session().file_modified == Some(modified) {
            return Ok(());
        }

        let token = tokio::fs::read_to_string(path).await?.trim().to_string();
        if token.is_empty() {
            return Err(SponsorGraphError::Credential(format!(
                "{} is empty",
                path.display()
            )));
        }

        let mut session = self.lock_session();
        session.token = Some(token);
        session.file_modified = Some(modified);
        tracing::info!("Loaded API token from {}", path.display());

        Ok(())
    }

    async fn resolve_seed(&self, handle: &str) -> Result<Option<SeedCandidate>> {
        let response = match self
            .post::<SeedData>(SEED_QUERY, json!({ "login": handle }))
            .await?
        {
            Some(response) => response,
            None => return Ok(None),
        };

        if let Some(error) = response.structural_error() {
            return Err(self.graphql_error(&error.message));
        }

        let owner = match response.data.and_then(|d| d.owner) {
            Some(owner) => owner,
            None => return Ok(None),
        };

        let account = match (AccountKind::from_typename(&owner.typename), owner.database_id) {
            (Some(kind), Some(id)) => AccountRef::new(id, owner.login, kind),
            _ => return Ok(None),
        };

        Ok(Some(SeedCandidate {
            account,
            sponsors_total: owner.sponsors.unwrap_or_default().total_count,
            sponsoring_total: owner.sponsoring.unwrap_or_default().total_count,
        }))
    }

    async fn enrich(
        &self,
        handle: &str,
        refresh: bool,
        prior: Option<&Identity>,
    ) -> Result<EnrichOutcome> {
        let response = match self
            .post::<OwnerData>(PROFILE_QUERY, json!({ "login": handle }))
            .await?
        {
            Some(response) => response,
            None => {
                tracing::info!("Profile of {} is restricted", handle);
                return Ok(EnrichOutcome::Unavailable);
            }
        };

        let structural = response.structural_error().map(|e| e.message.clone());
        let owner = response.data.and_then(|d| d.owner);

        let mut profile = match (owner.and_then(|o| o.into_profile()), structural) {
            (Some(profile), error) => {
                if let Some(error) = error {
                    tracing::warn!("Profile of {} came with an error: {}", handle, error);
                }
                profile
            }
            (None, None) => return Ok(EnrichOutcome::NotFound),
            (None, Some(error)) => return Err(self.graphql_error(&error)),
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
        cursor: Option<&str>,
    ) -> Result<Option<RelationshipPage>> {
        let query = relationship_query(account.kind, direction);
        let mut variables = json!({
            "login": account.handle,
            "first": self.page_size,
            "after": cursor,
        });
        if direction == Direction::AsSponsored {
            variables["firstPage"] = json!(cursor.is_none());
        }

        let response = match self.post::<RelationshipData>(&query, variables).await? {
            Some(response) => response,
            None => return Ok(None),
        };

        let error = response.structural_error().map(|e| e.message.clone());
        let page = match response.data.and_then(|d| d.owner) {
            Some(owner) => RelationshipPage {
                error,
                ..owner.into_page()
            },
            None => RelationshipPage {
                error: Some(error.unwrap_or_else(|| format!("{} not found", account.handle))),
                ..RelationshipPage::default()
            },
        };

        Ok(Some(page))
    }

    async fn fetch_yearly_activity(
        &self,
        account: &AccountRef,
        year: i32,
    ) -> Result<Option<YearlyActivity>> {
        if account.kind != AccountKind::Person {
            return Ok(None);
        }

        let from = match Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single() {
            Some(from) => from,
            None => return Ok(None),
        };
        let end_of_year = Utc
            .with_ymd_and_hms(year, 12, 31, 23, 59, 59)
            .single()
            .unwrap_or(from);
        let to = end_of_year.min(Utc::now());
        if to < from {
            return Ok(None);
        }

        let variables = json!({
            "login": account.handle,
            "from": from.to_rfc3339_opts(SecondsFormat::Secs, true),
            "to": to.to_rfc3339_opts(SecondsFormat::Secs, true),
        });

        let response = match self.post::<ActivityData>(ACTIVITY_QUERY, variables).await? {
            Some(response) => response,
            None => return Ok(None),
        };

        if let Some(error) = response.structural_error() {
            return Err(self.graphql_error(&error.message));
        }

        Ok(response
            .data
            .and_then(|d| d.user)
            .map(|user| user.contributions_collection.into()))
    }
}

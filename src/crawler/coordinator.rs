//! Crawler coordinator - the worker loop
//!
//! The coordinator owns everything one worker needs:
//! - The configuration
//! - The storage handle, replaced on reconnect
//! - The platform client
//! - The cancellation token shared with the signal handler
//!
//! Each iteration refreshes the session, runs the staleness sweep when it is
//! due, pulls the oldest pending entry and runs one crawl step on it.

use crate::config::Config;
use crate::crawler::seed::{requeue_skipped, seed_account, SeedOutcome};
use crate::crawler::step::{crawl_step, StepOutcome};
use crate::platform::Platform;
use crate::storage::{SqliteStorage, Storage};
use crate::{Result, SponsorGraphError};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// When the worker loop returns on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Wait for new work forever; only cancellation stops the loop
    Forever,

    /// Return as soon as no pending entry is left
    UntilIdle,
}

/// Counters for one run of the worker loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: u64,
    pub completed: u64,
    pub skipped: u64,
    pub removed: u64,
    pub unavailable: u64,
    pub edges_added: u64,
    pub edges_removed: u64,
    pub enqueued: u64,
    pub reactivated: u64,
    pub transient_errors: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &StepOutcome) {
        self.steps += 1;
        match outcome {
            StepOutcome::Skipped => self.skipped += 1,
            StepOutcome::Removed(_) => self.removed += 1,
            StepOutcome::Unavailable => self.unavailable += 1,
            StepOutcome::Completed {
                edges_added,
                edges_removed,
                enqueued,
                ..
            } => {
                self.completed += 1;
                self.edges_added += *edges_added as u64;
                self.edges_removed += *edges_removed as u64;
                self.enqueued += *enqueued as u64;
            }
        }
    }
}

enum Tick {
    /// A frontier entry was processed
    Worked,

    /// No pending entry
    Idle,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SqliteStorage,
    platform: Arc<dyn Platform>,
    cancel: CancellationToken,
    last_sweep: Option<Instant>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `platform` - The platform client every step talks to
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SponsorGraphError)` - Failed to open the database
    pub fn new(config: Config, platform: Arc<dyn Platform>) -> Result<Self> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

        Ok(Self {
            config: Arc::new(config),
            storage,
            platform,
            cancel: CancellationToken::new(),
            last_sweep: None,
        })
    }

    /// Token that stops the worker loop between steps when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Read access to the store, for statistics and tests
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Seeds every handle, logging and skipping rejected ones
    pub async fn seed<I, H>(&mut self, handles: I) -> Result<Vec<SeedOutcome>>
    where
        I: IntoIterator<Item = H>,
        H: AsRef<str>,
    {
        self.platform.refresh_session().await?;

        let mut outcomes = Vec::new();
        for handle in handles {
            let outcome = seed_account(&mut self.storage, self.platform.as_ref(), handle.as_ref()).await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Requeues skipped entries as new roots
    pub fn requeue_skipped(&mut self) -> Result<usize> {
        requeue_skipped(&mut self.storage)
    }

    /// Runs the worker loop
    ///
    /// Transient failures abandon the current step, reconnect the store when
    /// the failure came from it, back off and carry on. Any other failure is
    /// logged, backed off and returned.
    pub async fn run(&mut self, mode: RunMode) -> Result<RunSummary> {
        tracing::info!(
            "Starting worker (max depth {}, staleness {} days)",
            self.config.crawler.max_depth,
            self.config.crawler.staleness_days
        );

        let idle_wait = Duration::from_secs(self.config.crawler.idle_wait_secs);
        let backoff = Duration::from_secs(self.config.crawler.error_backoff_secs);
        let mut summary = RunSummary::default();

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Cancellation requested, stopping worker");
                break;
            }

            match self.tick(&mut summary).await {
                Ok(Tick::Worked) => {}
                Ok(Tick::Idle) => {
                    if mode == RunMode::UntilIdle {
                        tracing::info!("Frontier drained, stopping worker");
                        break;
                    }
                    tracing::debug!("No pending entries, waiting {:?}", idle_wait);
                    if !self.pause(idle_wait).await {
                        break;
                    }
                }
                Err(e) if e.is_transient() => {
                    self.recover(&e, &mut summary);
                    if !self.pause(backoff).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Worker failed: {}", e);
                    self.pause(backoff).await;
                    return Err(e);
                }
            }
        }

        tracing::info!(
            "Worker stopped after {} steps: {} completed, {} skipped, {} removed, {} restricted, {} enqueued",
            summary.steps,
            summary.completed,
            summary.skipped,
            summary.removed,
            summary.unavailable,
            summary.enqueued
        );

        Ok(summary)
    }

    async fn tick(&mut self, summary: &mut RunSummary) -> Result<Tick> {
        self.platform.refresh_session().await?;
        summary.reactivated += self.sweep_if_due()? as u64;

        let entry = match self.storage.next_pending()? {
            Some(entry) => entry,
            None => return Ok(Tick::Idle),
        };

        let outcome = crawl_step(
            &mut self.storage,
            self.platform.as_ref(),
            &entry,
            self.config.crawler.max_depth,
        )
        .await?;
        summary.record(&outcome);

        self.pause(Duration::from_millis(self.config.crawler.step_delay_ms))
            .await;

        Ok(Tick::Worked)
    }

    /// Reactivates stale entries on a fixed wall-clock cadence
    fn sweep_if_due(&mut self) -> Result<usize> {
        let interval = Duration::from_secs(self.config.crawler.stale_sweep_interval_secs);
        if self
            .last_sweep
            .is_some_and(|last| last.elapsed() < interval)
        {
            return Ok(0);
        }

        let reactivated = self
            .storage
            .reactivate_stale(self.config.crawler.staleness_days, Utc::now())?;
        self.last_sweep = Some(Instant::now());

        if reactivated > 0 {
            tracing::info!("Staleness sweep reactivated {} entries", reactivated);
        }
        Ok(reactivated)
    }

    /// Counts an abandoned step and reconnects the store if it was the cause
    fn recover(&mut self, error: &SponsorGraphError, summary: &mut RunSummary) {
        summary.transient_errors += 1;
        tracing::warn!("Crawl step abandoned: {}", error);
        if error.is_storage() {
            self.reconnect();
        }
    }

    /// Replaces the storage handle with a fresh connection
    fn reconnect(&mut self) {
        match SqliteStorage::new(Path::new(&self.config.output.database_path)) {
            Ok(storage) => {
                self.storage = storage;
                tracing::info!("Reconnected to {}", self.config.output.database_path);
            }
            Err(e) => tracing::warn!("Reconnect failed, keeping old connection: {}", e),
        }
    }

    /// Sleeps for `duration` unless cancelled first
    ///
    /// # Returns
    ///
    /// `false` if the wait was cut short by cancellation
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }

        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

/// Opens the store and runs the worker loop until cancelled
///
/// # Example
///
/// ```no_run
/// use sponsor_graph::config::load_config;
/// use sponsor_graph::crawler::{run_crawl, RunMode};
/// use sponsor_graph::github::GitHubClient;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let client = GitHubClient::new(&config.api)?;
/// run_crawl(config, Arc::new(client), RunMode::Forever).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    platform: Arc<dyn Platform>,
    mode: RunMode,
) -> std::result::Result<RunSummary, SponsorGraphError> {
    let mut coordinator = Coordinator::new(config, platform)?;
    coordinator.run(mode).await
}

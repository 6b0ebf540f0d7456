//! Sponsor-Graph main entry point
//!
//! This is the command-line interface for the sponsorship graph crawler.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sponsor_graph::config::{load_config_with_hash, Config};
use sponsor_graph::crawler::{Coordinator, RunMode, SeedOutcome};
use sponsor_graph::github::GitHubClient;
use tracing_subscriber::EnvFilter;

/// Sponsor-Graph: a sponsorship graph crawler
///
/// Sponsor-Graph walks GitHub's "sponsors" and "sponsoring" relationships
/// outward from seed accounts, keeping the graph and every reached profile
/// up to date in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "sponsor-graph")]
#[command(version)]
#[command(about = "A sponsorship graph crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Seed a handle as a new crawl root (repeatable)
    #[arg(long = "seed", value_name = "HANDLE")]
    seeds: Vec<String>,

    /// Stop once no pending work is left instead of waiting for more
    #[arg(long)]
    drain: bool,

    /// Requeue skipped entries as new roots before crawling
    #[arg(long)]
    requeue_skipped: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "drain"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "drain"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    for handle in &cli.seeds {
        sponsor_graph::config::validate_handle(handle.trim_start_matches('@'))?;
    }

    if cli.dry_run {
        handle_dry_run(&config, &cli.seeds);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        let mode = if cli.drain {
            RunMode::UntilIdle
        } else {
            RunMode::Forever
        };
        handle_crawl(config, cli.seeds, cli.requeue_skipped, mode).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sponsor_graph=info,warn"),
            1 => EnvFilter::new("sponsor_graph=debug,info"),
            2 => EnvFilter::new("sponsor_graph=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the validated config and the seeds
fn handle_dry_run(config: &Config, cli_seeds: &[String]) {
    println!("=== Sponsor-Graph Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Staleness window: {} days", config.crawler.staleness_days);
    println!(
        "  Stale sweep interval: {}s",
        config.crawler.stale_sweep_interval_secs
    );
    println!("  Idle wait: {}s", config.crawler.idle_wait_secs);
    println!("  Step delay: {}ms", config.crawler.step_delay_ms);

    println!("\nAPI:");
    println!("  Endpoint: {}", config.api.graphql_url);
    match &config.api.token_file {
        Some(path) => println!("  Token file: {}", path),
        None => println!("  Token variable: {}", config.api.token_env),
    }
    println!("  Page size: {}", config.api.page_size);
    println!("  User agent: {}", config.api.user_agent);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let seeds: Vec<&str> = config
        .seeds
        .iter()
        .map(|s| s.handle.as_str())
        .chain(cli_seeds.iter().map(String::as_str))
        .collect();
    println!("\nSeeds ({}):", seeds.len());
    for handle in &seeds {
        println!("  - {}", handle);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use sponsor_graph::output::{load_statistics, print_statistics};
    use sponsor_graph::storage::SqliteStorage;

    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    cli_seeds: Vec<String>,
    requeue: bool,
    mode: RunMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let seeds: Vec<String> = config
        .seeds
        .iter()
        .map(|s| s.handle.clone())
        .chain(cli_seeds)
        .collect();

    let client = GitHubClient::new(&config.api)?;
    let mut coordinator = Coordinator::new(config, Arc::new(client))?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current step");
            cancel.cancel();
        }
    });

    if !seeds.is_empty() {
        let outcomes = coordinator.seed(&seeds).await?;
        let enqueued = outcomes
            .iter()
            .filter(|o| matches!(o, SeedOutcome::Enqueued(_)))
            .count();
        tracing::info!("Seeded {} of {} handles", enqueued, seeds.len());
    }

    if requeue {
        coordinator.requeue_skipped()?;
    }

    match coordinator.run(mode).await {
        Ok(_) => {
            tracing::info!("Crawl finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

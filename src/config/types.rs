use serde::Deserialize;

/// Main configuration structure for Sponsor-Graph
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub api: ApiConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "seed")]
    pub seeds: Vec<SeedEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum traversal depth; entries deeper than this are skipped
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Days after which an enriched account is crawled again
    #[serde(rename = "staleness-days")]
    pub staleness_days: u32,

    /// Seconds between staleness sweeps
    #[serde(rename = "stale-sweep-interval-secs", default = "default_sweep_interval")]
    pub stale_sweep_interval_secs: u64,

    /// Seconds to wait when the frontier has no pending entry
    #[serde(rename = "idle-wait-secs", default = "default_idle_wait")]
    pub idle_wait_secs: u64,

    /// Pause after every crawl step (milliseconds)
    #[serde(rename = "step-delay-ms", default = "default_step_delay")]
    pub step_delay_ms: u64,

    /// Pause after a failed crawl step (seconds)
    #[serde(rename = "error-backoff-secs", default = "default_error_backoff")]
    pub error_backoff_secs: u64,
}

/// Platform API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// GraphQL endpoint
    #[serde(rename = "graphql-url", default = "default_graphql_url")]
    pub graphql_url: String,

    /// Environment variable holding the access token
    #[serde(rename = "token-env", default = "default_token_env")]
    pub token_env: String,

    /// File holding the access token; re-read when it changes
    #[serde(rename = "token-file", default)]
    pub token_file: Option<String>,

    /// Nodes requested per relationship page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Extra seconds slept past a rate-limit reset
    #[serde(rename = "rate-limit-buffer-secs", default = "default_rate_limit_buffer")]
    pub rate_limit_buffer_secs: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Root account to start crawling from
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub handle: String,
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_idle_wait() -> u64 {
    30
}

fn default_step_delay() -> u64 {
    1000
}

fn default_error_backoff() -> u64 {
    10
}

fn default_graphql_url() -> String {
    "https://api.github.com/graphql".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_rate_limit_buffer() -> u64 {
    5
}

fn default_user_agent() -> String {
    concat!("sponsor-graph/", env!("CARGO_PKG_VERSION")).to_string()
}

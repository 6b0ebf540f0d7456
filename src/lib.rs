//! Sponsor-Graph: a sponsorship graph crawler
//!
//! This crate crawls outward from seed accounts on GitHub through "sponsors" and
//! "sponsoring" relationships, keeping a directed sponsorship graph and the
//! profile of every account it reaches up to date.

pub mod config;
pub mod crawler;
pub mod github;
pub mod output;
pub mod platform;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Sponsor-Graph operations
#[derive(Debug, Error)]
pub enum SponsorGraphError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("API request to {url} failed with HTTP {status}: {message}")]
    Api {
        url: String,
        status: u16,
        message: String,
    },

    #[error("API request to {url} returned no data: {message}")]
    GraphQl { url: String, message: String },

    #[error("Malformed API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Missing API credential: {0}")]
    Credential(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SponsorGraphError {
    /// Returns true for failures that are expected to clear up on their own
    ///
    /// Transient failures abandon the current crawl step and the worker loop
    /// carries on. Everything else stops the worker.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } | Self::Reqwest(source) => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::Api { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            // Upstream resolver failures without data clear up on a later try
            Self::GraphQl { .. } => true,
            Self::Database(e) => is_transient_sqlite(e),
            Self::Storage(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns true when the failure came from the persistent store
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Storage(_))
    }
}

/// Classifies SQLite errors that a reconnect can fix
pub(crate) fn is_transient_sqlite(error: &rusqlite::Error) -> bool {
    use rusqlite::ErrorCode;

    match error {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.code,
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
        ),
        _ => false,
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Sponsor-Graph operations
pub type Result<T> = std::result::Result<T, SponsorGraphError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use platform::{AccountKind, AccountRef, Direction, Platform};
pub use state::{AccountState, FrontierStatus};

use crate::config::types::{ApiConfig, Config, CrawlerConfig, OutputConfig, SeedEntry};
use crate::ConfigError;
use url::Url;

/// Longest handle the platform allows
const MAX_HANDLE_LEN: usize = 39;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_depth < 1 {
        return Err(ConfigError::Validation(format!(
            "max_depth must be >= 1, got {}",
            config.max_depth
        )));
    }

    if config.staleness_days < 1 {
        return Err(ConfigError::Validation(format!(
            "staleness_days must be >= 1, got {}",
            config.staleness_days
        )));
    }

    if config.stale_sweep_interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "stale_sweep_interval_secs must be >= 1, got {}",
            config.stale_sweep_interval_secs
        )));
    }

    Ok(())
}

/// Validates API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.graphql_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid graphql_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "graphql_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.token_env.is_empty() && config.token_file.is_none() {
        return Err(ConfigError::Validation(
            "either token_env or token_file must be set".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed entries
fn validate_seeds(seeds: &[SeedEntry]) -> Result<(), ConfigError> {
    for seed in seeds {
        validate_handle(&seed.handle)?;
    }
    Ok(())
}

/// Validates a platform handle
///
/// Handles are 1 to 39 ASCII alphanumerics or single hyphens, and cannot
/// start or end with a hyphen.
pub fn validate_handle(handle: &str) -> Result<(), ConfigError> {
    if handle.is_empty() {
        return Err(ConfigError::Validation(
            "Seed handle cannot be empty".to_string(),
        ));
    }

    if handle.len() > MAX_HANDLE_LEN {
        return Err(ConfigError::Validation(format!(
            "Seed handle '{}' is longer than {} characters",
            handle, MAX_HANDLE_LEN
        )));
    }

    if !handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "Seed handle '{}' contains invalid characters",
            handle
        )));
    }

    if handle.starts_with('-') || handle.ends_with('-') || handle.contains("--") {
        return Err(ConfigError::Validation(format!(
            "Seed handle '{}' has a misplaced hyphen",
            handle
        )));
    }

    Ok(())
}

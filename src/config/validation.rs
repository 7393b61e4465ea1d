use crate::config::types::{
    BlockingConfig, Config, CrawlerConfig, IdentityConfig, OutputConfig, PolitenessConfig,
    RetryConfig,
};
use crate::extract::SiteProfile;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_politeness_config(&config.politeness)?;
    validate_identity_config(&config.identity)?;
    validate_blocking_config(&config.blocking)?;
    validate_output_config(&config.output)?;

    // Compiling the profile surfaces bad selector overrides up front
    SiteProfile::from_config(&config.site)?;

    Ok(())
}

/// Validates crawl scope settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    if config.workers < 1 || config.workers > 32 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 32, got {}",
            config.workers
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    for pattern in &config.allowed_domains {
        validate_domain_pattern(pattern)?;
    }

    Ok(())
}

/// Validates retry policy settings
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_retries > 20 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 20, got {}",
            config.max_retries
        )));
    }

    if config.backoff_factor.is_nan() || config.backoff_factor <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "backoff_factor must be > 0, got {}",
            config.backoff_factor
        )));
    }

    if config.max_backoff < config.backoff_factor {
        return Err(ConfigError::Validation(format!(
            "max_backoff ({}) must be >= backoff_factor ({})",
            config.max_backoff, config.backoff_factor
        )));
    }

    if let Some(status) = config
        .statuses
        .iter()
        .find(|s| !(100..=599).contains(*s))
    {
        return Err(ConfigError::Validation(format!(
            "retry status {} is not a valid HTTP status",
            status
        )));
    }

    Ok(())
}

/// Validates politeness delay ranges
fn validate_politeness_config(config: &PolitenessConfig) -> Result<(), ConfigError> {
    for (name, [min, max]) in [
        ("listing_delay_ms", config.listing_delay_ms),
        ("detail_delay_ms", config.detail_delay_ms),
    ] {
        if min > max {
            return Err(ConfigError::Validation(format!(
                "{} range is inverted: [{}, {}]",
                name, min, max
            )));
        }
    }
    Ok(())
}

/// Validates identity pool overrides
fn validate_identity_config(config: &IdentityConfig) -> Result<(), ConfigError> {
    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents cannot contain empty entries".to_string(),
        ));
    }

    if config
        .accept_languages
        .iter()
        .any(|lang| lang.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "accept_languages cannot contain empty entries".to_string(),
        ));
    }

    if let Some(referer) = &config.referer {
        Url::parse(referer)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid referer: {}", e)))?;
    }

    if let Some(param) = &config.cache_buster_param {
        if param.is_empty() || !param.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::Validation(format!(
                "cache_buster_param must be a non-empty identifier, got '{}'",
                param
            )));
        }
    }

    Ok(())
}

/// Validates soft-block markers
fn validate_blocking_config(config: &BlockingConfig) -> Result<(), ConfigError> {
    if config.markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "blocking markers cannot be empty strings".to_string(),
        ));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.records_path.is_empty() {
        return Err(ConfigError::Validation(
            "records_path cannot be empty".to_string(),
        ));
    }

    if config.seen_ids_path.is_empty() {
        return Err(ConfigError::Validation(
            "seen_ids_path cannot be empty".to_string(),
        ));
    }

    if config.records_path == config.seen_ids_path {
        return Err(ConfigError::Validation(
            "records_path and seen_ids_path must differ".to_string(),
        ));
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);

    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains("..")
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' is malformed",
            domain
        )));
    }

    Ok(())
}
